//! Caption rendering for the uploaded album

use crate::config::BuildContext;

/// Telegram's limit for media captions
pub const MAX_CAPTION_LEN: usize = 1024;

/// Placeholder used when the commit has no message
pub const NO_MESSAGE: &str = "(no message)";

/// Commit link, falling back to the workflow run.
pub fn effective_commit_url(ctx: &BuildContext) -> &str {
    ctx.commit_url
        .as_deref()
        .filter(|url| !url.is_empty())
        .unwrap_or(&ctx.run_url)
}

pub fn effective_commit_message(ctx: &BuildContext) -> &str {
    ctx.commit_message
        .as_deref()
        .map(str::trim)
        .filter(|msg| !msg.is_empty())
        .unwrap_or(NO_MESSAGE)
}

/// Render the markdown caption without any length check.
pub fn render_template(ctx: &BuildContext) -> String {
    format!(
        "**{title}**\n\
         Branch: {branch}\n\
         #ci_{version}\n\
         ```\n\
         {commit_message}\n\
         ```\n\
         [Commit]({commit_url})\n\
         [Workflow run]({run_url})",
        title = ctx.title,
        branch = ctx.branch,
        version = ctx.version,
        commit_message = effective_commit_message(ctx),
        commit_url = effective_commit_url(ctx),
        run_url = ctx.run_url,
    )
}

/// Build the album caption. Anything longer than [`MAX_CAPTION_LEN`]
/// characters is replaced by the bare commit link.
pub fn build_caption(ctx: &BuildContext) -> String {
    let caption = render_template(ctx);
    if caption.chars().count() > MAX_CAPTION_LEN {
        return effective_commit_url(ctx).to_string();
    }
    caption
}

/// One caption per file; only the last one carries text.
pub fn caption_list(file_count: usize, caption: &str) -> Vec<String> {
    let mut captions = vec![String::new(); file_count];
    if let Some(last) = captions.last_mut() {
        *last = caption.to_string();
    }
    captions
}

/// Turn line breaks outside code fences into markdown hard breaks.
///
/// Telegram's markdown parser drops plain newlines inside a paragraph, so
/// every template line would run into the next. Newlines inside a fence, and
/// those next to a fence line, stay as they are: a fence must sit on its own
/// line.
pub fn with_hard_breaks(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len() + 16);
    let mut in_fence = false;
    let mut lines = markdown.split('\n').peekable();

    while let Some(line) = lines.next() {
        out.push_str(line);
        let is_fence = is_fence_line(line);
        if is_fence {
            in_fence = !in_fence;
        }

        let Some(next) = lines.peek() else { break };
        if in_fence || is_fence || is_fence_line(next) {
            out.push('\n');
        } else {
            out.push_str("\\\n");
        }
    }

    out
}

fn is_fence_line(line: &str) -> bool {
    line.trim_start().starts_with("```")
}
