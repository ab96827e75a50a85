//! Scripts the resolver evaluates in the page.

/// Collects every element that could be a target, in document order, and keeps
/// them in `window.__domReplayCandidates` so later calls can address them by index.
pub const SCAN_SCRIPT: &str = r#"
/* dom-replay:scan */
(() => {
    const clean = (s, max) => {
        if (s === null || s === undefined) return null;
        const t = String(s).replace(/\s+/g, ' ').trim();
        return t ? t.slice(0, max || 200) : null;
    };

    function labelFor(el) {
        if (el.labels && el.labels.length) return clean(el.labels[0].innerText || el.labels[0].textContent);
        const wrap = el.closest('label');
        if (wrap) return clean(wrap.innerText || wrap.textContent);
        const by = el.getAttribute('aria-labelledby');
        if (by) {
            const l = document.getElementById(by);
            if (l) return clean(l.textContent);
        }
        return null;
    }

    function contextFor(el) {
        const fs = el.closest('fieldset');
        if (fs) {
            const legend = fs.querySelector('legend');
            if (legend) return clean(legend.textContent, 80);
        }
        let prev = el.previousElementSibling;
        while (prev) {
            const t = clean(prev.innerText || prev.textContent, 80);
            if (t) return t;
            prev = prev.previousElementSibling;
        }
        return null;
    }

    function isVisible(el, r) {
        if (r.width <= 0 || r.height <= 0) return false;
        const style = getComputedStyle(el);
        return style.visibility !== 'hidden' && style.display !== 'none' && style.opacity !== '0';
    }

    const SELECTOR = 'button, a, input, textarea, select, summary, label, [role], [contenteditable], '
        + '[aria-label], [placeholder], [onclick]';
    const seen = new Set();
    const list = [];
    const add = (el) => {
        if (!seen.has(el)) {
            seen.add(el);
            list.push(el);
        }
    };

    document.querySelectorAll(SELECTOR).forEach(add);

    const root = document.body || document.documentElement;
    const walker = document.createTreeWalker(root, NodeFilter.SHOW_TEXT);
    while (walker.nextNode()) {
        const node = walker.currentNode;
        const parent = node.parentElement;
        if (parent && node.textContent.trim() && !['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE'].includes(parent.tagName)) {
            add(parent);
        }
    }

    list.sort((a, b) => (a.compareDocumentPosition(b) & Node.DOCUMENT_POSITION_FOLLOWING) ? -1 : 1);
    window.__domReplayCandidates = list;

    return JSON.stringify(list.slice(0, 3000).map((el, i) => {
        const tag = el.tagName.toLowerCase();
        const r = el.getBoundingClientRect();
        const field = tag === 'input' || tag === 'textarea' || tag === 'select';
        const type = tag === 'input' ? (el.type || 'text').toLowerCase() : clean(el.getAttribute('type'));
        let text = null;
        if (tag === 'input') {
            if (type === 'submit' || type === 'button' || type === 'reset') text = clean(el.value);
        } else if (!field) {
            text = clean(el.innerText || el.textContent);
        }
        return {
            dom_index: i,
            tag_name: tag,
            input_type: type ? type.toLowerCase() : null,
            role: clean(el.getAttribute('role')),
            text: text,
            label: field ? labelFor(el) : null,
            placeholder: clean(el.getAttribute('placeholder')),
            aria_label: clean(el.getAttribute('aria-label')),
            name: clean(el.getAttribute('name')),
            id: clean(el.id),
            context: field ? contextFor(el) : null,
            editable: !!el.isContentEditable,
            rect: { x: r.left, y: r.top, width: r.width, height: r.height },
            visible: isVisible(el, r)
        };
    }));
})()
"#;

/// Scrolls a scanned candidate into view and returns its fresh bounding box
pub fn locate_script(dom_index: usize) -> String {
    format!(
        r#"
/* dom-replay:locate */
(() => {{
    const el = (window.__domReplayCandidates || [])[{}];
    if (!el || !el.isConnected) return null;
    el.scrollIntoView({{ block: 'center', inline: 'center' }});
    const r = el.getBoundingClientRect();
    return JSON.stringify({{ x: r.left, y: r.top, width: r.width, height: r.height }});
}})()
"#,
        dom_index
    )
}

/// Focuses a candidate and empties it, so inserted text replaces the old value.
/// For `<select>` the option whose text or value matches is chosen instead;
/// returns `"selected"` in that case.
pub fn prepare_field_script(dom_index: usize, text: &str) -> String {
    format!(
        r#"
/* dom-replay:prepare */
(() => {{
    const el = (window.__domReplayCandidates || [])[{}];
    if (!el || !el.isConnected) return 'missing';
    const wanted = {};
    el.focus();
    if (el.tagName === 'SELECT') {{
        const norm = (s) => String(s).replace(/\s+/g, ' ').trim().toLowerCase();
        const option = Array.from(el.options).find(o => norm(o.value) === norm(wanted) || norm(o.text) === norm(wanted));
        if (!option) return 'missing';
        el.value = option.value;
        el.dispatchEvent(new Event('input', {{ bubbles: true }}));
        el.dispatchEvent(new Event('change', {{ bubbles: true }}));
        return 'selected';
    }}
    if (el.isContentEditable) {{
        el.textContent = '';
    }} else if ('value' in el) {{
        el.value = '';
        el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    }}
    return 'cleared';
}})()
"#,
        dom_index,
        js_string(text)
    )
}

pub fn focus_script(dom_index: usize) -> String {
    format!(
        r#"
/* dom-replay:focus */
(() => {{
    const el = (window.__domReplayCandidates || [])[{}];
    if (!el || !el.isConnected) return false;
    el.focus();
    return true;
}})()
"#,
        dom_index
    )
}

/// Moves the visual cursor overlay; it glides over `travel_ms`
pub fn cursor_script(x: f64, y: f64, travel_ms: u64) -> String {
    format!(
        r#"
/* dom-replay:cursor */
(() => {{
    let c = document.getElementById('__domReplayCursor');
    if (!c) {{
        c = document.createElement('div');
        c.id = '__domReplayCursor';
        c.style.cssText = 'position:fixed;width:18px;height:18px;margin:-9px 0 0 -9px;border-radius:50%;'
            + 'background:rgba(230,57,70,.55);border:2px solid #e63946;pointer-events:none;z-index:2147483647;'
            + 'left:0;top:0;';
        (document.body || document.documentElement).appendChild(c);
    }}
    c.style.transition = 'left {travel}ms ease-out, top {travel}ms ease-out';
    c.style.left = '{x}px';
    c.style.top = '{y}px';
    return true;
}})()
"#,
        travel = travel_ms,
        x = x.round(),
        y = y.round()
    )
}

pub fn scroll_script(x: f64, y: f64) -> String {
    format!(
        "/* dom-replay:scroll */ (() => {{ window.scrollTo({}, {}); return true; }})()",
        x, y
    )
}

/// Quotes a Rust string as a JavaScript string literal
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_is_quoted_safely() {
        let script = prepare_field_script(4, "it's \"quoted\"\n</script>");
        assert!(script.contains(r#"const wanted = "it's \"quoted\"\n</script>";"#));
        assert!(script.contains("__domReplayCandidates || [])[4]"));
    }

    #[test]
    fn test_cursor_coordinates_are_rounded() {
        let script = cursor_script(10.4, 99.6, 300);
        assert!(script.contains("c.style.left = '10px'"));
        assert!(script.contains("c.style.top = '100px'"));
        assert!(script.contains("left 300ms"));
    }
}
