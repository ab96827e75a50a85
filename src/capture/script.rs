//! In-page instrumentation.
//!
//! Listeners are attached to `window` in the capture phase so they exist before
//! `<body>` does; the same script is registered for every new document, which
//! puts it in place ahead of `DOMContentLoaded`.

/// Installs listeners and the event queue (`window.__domReplay`). Idempotent.
pub const INSTRUMENTATION_SCRIPT: &str = r#"
/* dom-replay:install */
(() => {
    if (window.__domReplay && window.__domReplay.installed) return true;

    const ns = { installed: true, epoch: null, paused: false, queue: [] };
    window.__domReplay = ns;

    const clean = (s, max) => {
        if (s === null || s === undefined) return null;
        const t = String(s).replace(/\s+/g, ' ').trim();
        return t ? t.slice(0, max || 200) : null;
    };

    function labelFor(el) {
        if (el.labels && el.labels.length) {
            return clean(el.labels[0].innerText || el.labels[0].textContent);
        }
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

    function describe(el) {
        const r = el.getBoundingClientRect();
        const tag = el.tagName.toLowerCase();
        const field = tag === 'input' || tag === 'textarea' || tag === 'select';
        const type = (el.getAttribute('type') || (tag === 'input' ? 'text' : '')).toLowerCase();
        let text = null;
        if (tag === 'input') {
            if (type === 'submit' || type === 'button' || type === 'reset') text = clean(el.value);
        } else if (!field) {
            text = clean(el.innerText || el.textContent);
        }
        return {
            tag_name: tag,
            text: text,
            label: field ? labelFor(el) : null,
            placeholder: clean(el.getAttribute('placeholder')),
            aria_label: clean(el.getAttribute('aria-label')),
            input_type: type || null,
            role: clean(el.getAttribute('role')),
            id: clean(el.id),
            name: clean(el.getAttribute('name')),
            context: field ? contextFor(el) : null,
            position: { x: r.left + r.width / 2, y: r.top + r.height / 2 }
        };
    }

    const ACTIONABLE = 'button, a, input, textarea, select, summary, [role=button], [role=link], '
        + '[role=menuitem], [role=tab], [role=option], [contenteditable=""], [contenteditable=true]';

    function actionable(el) {
        return el.closest(ACTIONABLE) || el;
    }

    function editable(el) {
        const tag = el.tagName.toLowerCase();
        return tag === 'input' || tag === 'textarea' || el.isContentEditable;
    }

    function nearbyControls(el) {
        let scope = el.form || el.closest('form');
        if (!scope) {
            scope = el.parentElement;
            for (let i = 0; scope && i < 3; i++) {
                if (scope.querySelector('button, input[type=submit], [role=button]')) break;
                scope = scope.parentElement;
            }
        }
        if (!scope) return [];
        return Array.from(scope.querySelectorAll('button, input[type=submit], input[type=button], [role=button]'))
            .slice(0, 10)
            .map(describe);
    }

    function push(ev) {
        if (ns.paused) return;
        ev.timestamp = Date.now();
        ev.epoch = ns.epoch;
        ns.queue.push(ev);
        if (ns.queue.length > 1000) ns.queue.shift();
    }

    const ALWAYS = ['Enter', 'Tab', 'Escape'];
    const OUTSIDE_FIELDS = ['Backspace', 'Delete', 'ArrowUp', 'ArrowDown', 'ArrowLeft', 'ArrowRight',
        'Home', 'End', 'PageUp', 'PageDown', ' '];

    let scrollTimer = null;
    const handlers = {
        click: (e) => {
            if (!(e.target instanceof Element)) return;
            push({ kind: 'click', element: describe(actionable(e.target)) });
        },
        input: (e) => {
            const el = e.target;
            if (!(el instanceof Element)) return;
            const value = el.isContentEditable ? el.innerText : el.value;
            push({ kind: 'input', element: describe(el), value: value === undefined || value === null ? '' : String(value) });
        },
        focusout: (e) => {
            const el = e.target;
            if (!(el instanceof Element) || !editable(el)) return;
            push({ kind: 'blur', element: describe(el) });
        },
        keydown: (e) => {
            const el = e.target instanceof Element ? e.target : null;
            const inField = el && editable(el);
            if (!ALWAYS.includes(e.key) && !(OUTSIDE_FIELDS.includes(e.key) && !inField)) return;
            const ev = { kind: 'keydown', key: e.key === ' ' ? 'Space' : e.key };
            if (el && el !== document.body) ev.element = describe(el);
            if (e.key === 'Enter' && inField) ev.nearby_controls = nearbyControls(el);
            push(ev);
        },
        scroll: () => {
            clearTimeout(scrollTimer);
            scrollTimer = setTimeout(() => {
                push({ kind: 'scroll', scroll: { x: window.scrollX, y: window.scrollY } });
            }, 250);
        }
    };

    for (const [name, fn] of Object.entries(handlers)) {
        window.addEventListener(name, fn, { capture: true, passive: true });
    }

    ns.teardown = () => {
        for (const [name, fn] of Object.entries(handlers)) {
            window.removeEventListener(name, fn, { capture: true });
        }
        clearTimeout(scrollTimer);
        ns.installed = false;
        ns.queue.length = 0;
    };

    return true;
})()
"#;

/// Empties the queue; reports whether the instrumentation is still present and
/// which epoch the document carries.
pub const DRAIN_SCRIPT: &str = r#"
/* dom-replay:drain */
(() => {
    const ns = window.__domReplay;
    if (!ns || !ns.installed) {
        return JSON.stringify({ present: false, epoch: null, url: location.href, events: [] });
    }
    const events = ns.queue.splice(0, ns.queue.length);
    return JSON.stringify({ present: true, epoch: ns.epoch, url: location.href, events: events });
})()
"#;

pub const TEARDOWN_SCRIPT: &str = r#"
/* dom-replay:teardown */
(() => {
    const ns = window.__domReplay;
    if (ns && ns.teardown) ns.teardown();
    return true;
})()
"#;

/// Marks the current document with the session's navigation epoch
pub fn stamp_script(epoch: u64) -> String {
    format!(
        r#"
/* dom-replay:stamp */
(() => {{
    const ns = window.__domReplay;
    if (!ns || !ns.installed) return false;
    ns.epoch = {};
    return true;
}})()
"#,
        epoch
    )
}

pub fn pause_script(paused: bool) -> String {
    format!(
        r#"
/* dom-replay:pause */
(() => {{
    if (window.__domReplay) window.__domReplay.paused = {};
    return true;
}})()
"#,
        paused
    )
}
