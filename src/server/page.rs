//! Server-rendered HTML for the web UI.
//!
//! One page: the upload/options form on the left, messages and the chart on
//! the right. Everything is inline (styles, SVG, download data URI), so the
//! page works without any static assets.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use htmlescape::{encode_attribute, encode_minimal};

use crate::domain::FitResult;
use crate::io::export::{DEFAULT_DOWNLOAD_NAME, XLSX_MIME};
use crate::report::{format_initial_caption, format_param_line};
use crate::server::form::FitForm;

pub const MSG_UPLOAD_PROMPT: &str = "Upload an Excel file to begin.";
pub const MSG_FIT_COMPLETE: &str = "Fit complete.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
    Success,
}

impl Level {
    fn class(self) -> &'static str {
        match self {
            Level::Info => "msg info",
            Level::Error => "msg error",
            Level::Success => "msg success",
        }
    }
}

/// A status message box.
#[derive(Debug, Clone)]
pub struct Message {
    pub level: Level,
    pub text: String,
}

impl Message {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            text: text.into(),
        }
    }
}

/// Fit outputs shown under the chart.
#[derive(Debug, Clone)]
pub struct FitView {
    pub param_line: String,
    pub caption: String,
    /// Fitted workbook, offered as a download.
    pub workbook: Vec<u8>,
}

impl FitView {
    pub fn new(result: &FitResult, workbook: Vec<u8>) -> Self {
        Self {
            param_line: format_param_line(result),
            caption: format_initial_caption(result),
            workbook,
        }
    }
}

/// Everything the page needs to render.
#[derive(Debug, Clone, Default)]
pub struct PageView {
    /// Messages shown above the chart.
    pub messages: Vec<Message>,
    /// Inline SVG chart.
    pub chart: Option<String>,
    pub fit: Option<FitView>,
}

/// Render the full page for the given form state.
pub fn render_page(form: &FitForm, view: &PageView) -> String {
    let mut right = String::new();
    right.push_str("<h2>Plot</h2>\n");
    for msg in &view.messages {
        right.push_str(&render_message(msg));
    }
    if let Some(svg) = &view.chart {
        right.push_str("<div class=\"chart\">");
        right.push_str(svg);
        right.push_str("</div>\n");
    }
    if let Some(fit) = &view.fit {
        right.push_str(&render_message(&Message::success(MSG_FIT_COMPLETE)));
        right.push_str(&format!("<p class=\"params\">{}</p>\n", encode_minimal(&fit.param_line)));
        right.push_str(&format!("<p class=\"caption\">{}</p>\n", encode_minimal(&fit.caption)));
        right.push_str(&format!(
            "<a class=\"button\" download=\"{name}\" href=\"data:{mime};base64,{data}\">Download fitted Excel</a>\n",
            name = DEFAULT_DOWNLOAD_NAME,
            mime = XLSX_MIME,
            data = STANDARD.encode(&fit.workbook),
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>First-Order Fit (Ka, τ)</title>
<style>{STYLE}</style>
</head>
<body>
<h1>First-Order Step Fit (fit Ka and τ fast)</h1>
<div class="layout">
<form class="left" method="post" action="/fit" enctype="multipart/form-data">
<h2>1) Upload data</h2>
<label>Excel (.xlsx) with time in col A and y in col B
<input type="file" name="file" accept=".xlsx,.xlsm,.xls,.ods,.csv"></label>
<h2>2) Model inputs</h2>
<label>Step time t₀ <input type="number" step="any" name="t0" value="{t0}"></label>
<input type="hidden" name="fit_y0" value="false">
<label class="check"><input type="checkbox" name="fit_y0" value="true"{fit_y0}> Fit baseline offset y₀</label>
<h2>Excel read options</h2>
<label>Sheet name (blank = first sheet) <input type="text" name="sheet" value="{sheet}"></label>
<input type="hidden" name="header" value="false">
<label class="check"><input type="checkbox" name="header" value="true"{header}> First row is header</label>
<button type="submit" name="action" value="fit" class="primary">Fit model</button>
<button type="submit" name="action" value="preview">Plot data only</button>
</form>
<div class="right">
{right}</div>
</div>
</body>
</html>
"#,
        STYLE = STYLE,
        t0 = encode_attribute(&form.t0_text),
        fit_y0 = checked(form.fit_y0),
        sheet = encode_attribute(&form.sheet),
        header = checked(form.header),
        right = right,
    )
}

fn render_message(msg: &Message) -> String {
    format!(
        "<div class=\"{}\">{}</div>\n",
        msg.level.class(),
        encode_minimal(&msg.text)
    )
}

fn checked(on: bool) -> &'static str {
    if on { " checked" } else { "" }
}

const STYLE: &str = "\
body{font-family:system-ui,sans-serif;margin:1.5rem 2rem;color:#222}\
.layout{display:flex;gap:3rem;align-items:flex-start}\
.left{flex:1;max-width:24rem;display:flex;flex-direction:column;gap:.5rem}\
.right{flex:2;min-width:0}\
label{display:flex;flex-direction:column;gap:.25rem}\
label.check{flex-direction:row;align-items:center}\
input[type=text],input[type=number]{padding:.35rem}\
button,.button{padding:.5rem 1rem;border:1px solid #ccc;border-radius:.4rem;background:#fff;cursor:pointer;text-decoration:none;color:#222;display:inline-block;text-align:center}\
button.primary{background:#ff4b4b;border-color:#ff4b4b;color:#fff}\
.msg{padding:.75rem 1rem;border-radius:.4rem;margin:.5rem 0}\
.info{background:#e8f0fe}.error{background:#fde8e8}.success{background:#e6f4ea}\
.chart svg{max-width:100%;height:auto}\
.caption{color:#666;font-size:.9rem}";
