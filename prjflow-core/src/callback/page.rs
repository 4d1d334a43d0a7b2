//! Static result pages for the browser tab that completed the redirect

use ammonia::clean_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Success,
    Error,
}

/// Render a standalone HTML page; title and message are escaped
#[must_use]
pub fn render_page(kind: PageKind, title: &str, message: &str) -> String {
    let (icon, color) = match kind {
        PageKind::Success => ("&#10003;", "#52c41a"),
        PageKind::Error => ("&#10007;", "#ff4d4f"),
    };
    let title = clean_text(title);
    let message = clean_text(message);

    format!(
        r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
body {{ font-family: -apple-system, "Segoe UI", "PingFang SC", sans-serif; background: #f5f5f5; margin: 0; }}
.card {{ max-width: 420px; margin: 15vh auto 0; padding: 40px 32px; background: #fff; border-radius: 8px; text-align: center; box-shadow: 0 2px 8px rgba(0,0,0,.1); }}
.icon {{ font-size: 56px; color: {color}; }}
h1 {{ font-size: 20px; margin: 16px 0 8px; }}
p {{ color: #666; word-break: break-all; }}
</style>
</head>
<body>
<div class="card">
<div class="icon">{icon}</div>
<h1>{title}</h1>
<p>{message}</p>
</div>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_page() {
        let html = render_page(PageKind::Success, "Welcome", "Done");
        assert!(html.contains("<title>Welcome</title>"));
        assert!(html.contains("<p>Done</p>"));
        assert!(html.contains("&#10003;"));
    }

    #[test]
    fn test_whitespace_is_encoded() {
        // clean_text encodes spaces as character references, which browsers render as spaces
        let html = render_page(PageKind::Success, "Signed in", "ok");
        assert!(html.contains("<title>Signed&#32;in</title>"));
    }

    #[test]
    fn test_message_is_escaped() {
        let html = render_page(PageKind::Error, "Failed", "<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&#10007;"));
    }
}
