//! HTML fragment templates for per-test report extras.

/// Escape text for safe embedding inside HTML element bodies.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Collapsible block: a toggle link plus a dismissable popup carrying the
/// artifact body. `anchor` must be unique within the report.
pub fn collapsible_fragment(anchor: &str, title: &str, body: &str) -> String {
    format!(
        concat!(
            "<a onfocus=\"this.blur();\" href=\"javascript:toggle_collapsed('{anchor}')\">{title}</a>\n",
            "<p>\n",
            "<div id=\"{anchor}\" class=\"popup_window collapsed\" ",
            "style=\"background-color: #D9D9D9; margin-top: 10; margin-bottom: 10\">\n",
            "  <div style=\"text-align: right; color:black;cursor:pointer\">\n",
            "    <a onfocus=\"this.blur();\" ",
            "onclick=\"document.getElementById('{anchor}').style.display = 'none'\">[x]</a>\n",
            "  </div>\n",
            "  {body}\n",
            "</div>\n",
            "</p>\n",
        ),
        anchor = escape_html(anchor),
        title = escape_html(title),
        body = body,
    )
}

pub fn pre_block(escaped_text: &str) -> String {
    format!("<pre>{escaped_text}</pre>")
}

pub fn img_block(relative_src: &str) -> String {
    format!("<img src=\"{}\">", escape_html(relative_src))
}

/// Banner surfacing artifacts that were skipped for a test.
pub fn omission_banner(omissions: &[String]) -> String {
    let mut items = String::new();
    for omission in omissions {
        items.push_str(&format!("<li>{}</li>", escape_html(omission)));
    }
    format!(
        "<div class=\"profiling-omissions\" style=\"color: #8a6d3b\">\
         Profiling artifacts unavailable for this test:<ul>{items}</ul></div>"
    )
}
