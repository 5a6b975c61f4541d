use std::fmt::Write as _;

use crate::diagnosis::{DiagnosisResult, Verdict};
use crate::state::{Snapshot, UiState};

const STYLE: &str = r#"
        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif;
            background: #111827;
            color: #f9fafb;
            min-height: 100vh;
            display: flex;
            flex-direction: column;
            align-items: center;
            justify-content: center;
            padding: 20px;
        }

        main {
            display: flex;
            flex-direction: column;
            align-items: center;
            width: 100%;
            max-width: 56rem;
            gap: 24px;
        }

        header {
            text-align: center;
        }

        h1 {
            color: #4ade80;
            font-size: 2.5em;
            margin-bottom: 8px;
        }

        .subtitle {
            color: #9ca3af;
            font-size: 1.1em;
        }

        .uploader {
            width: 100%;
            max-width: 32rem;
            background: #1f2937;
            border: 2px dashed #4b5563;
            border-radius: 16px;
            padding: 24px;
            text-align: center;
        }

        .uploader:hover {
            border-color: #22c55e;
        }

        .uploader form {
            display: flex;
            flex-direction: column;
            align-items: center;
            gap: 16px;
        }

        .preview-image {
            max-height: 15rem;
            max-width: 100%;
            border-radius: 8px;
            box-shadow: 0 4px 15px rgba(0,0,0,0.4);
        }

        .controls {
            display: flex;
            gap: 16px;
            justify-content: center;
            margin-top: 16px;
        }

        button {
            border: none;
            border-radius: 8px;
            padding: 8px 24px;
            font-weight: 700;
            cursor: pointer;
            color: white;
        }

        .btn-secondary {
            background: #4b5563;
            font-weight: 400;
        }

        .btn-primary {
            background: #16a34a;
        }

        button:disabled {
            background: #166534;
            cursor: not-allowed;
            opacity: 0.6;
        }

        .error {
            background: #7f1d1d;
            border: 1px solid #ef4444;
            color: #fca5a5;
            padding: 12px 16px;
            border-radius: 8px;
            text-align: center;
        }

        .loading {
            text-align: center;
            color: #d1d5db;
        }

        .spinner {
            border: 4px solid transparent;
            border-bottom: 4px solid #22c55e;
            border-radius: 50%;
            width: 48px;
            height: 48px;
            animation: spin 1s linear infinite;
            margin: 0 auto 16px;
        }

        @keyframes spin {
            0% { transform: rotate(0deg); }
            100% { transform: rotate(360deg); }
        }

        .card {
            width: 100%;
            max-width: 42rem;
            background: #1f2937;
            border-radius: 16px;
            padding: 24px;
            border-top: 4px solid;
            box-shadow: 0 20px 60px rgba(0,0,0,0.5);
        }

        .card.healthy { border-top-color: #22c55e; }
        .card.inconclusive { border-top-color: #eab308; }
        .card.diseased { border-top-color: #ef4444; }

        .card h2 {
            font-size: 1.5em;
            margin-bottom: 4px;
        }

        .confidence {
            color: #9ca3af;
            font-size: 0.9em;
            margin-bottom: 16px;
        }

        .card h3 {
            color: #4ade80;
            margin: 16px 0 4px;
        }

        .card p, .card li {
            color: #d1d5db;
            line-height: 1.6;
        }

        .card ul {
            list-style: disc inside;
        }

        footer {
            color: #6b7280;
            font-size: 0.85em;
            text-align: center;
            margin-top: 32px;
        }
"#;

/// Renders the full page for one snapshot. The page shows exactly one of the
/// upload prompt, preview controls, spinner, card and error banner slots that
/// apply to `snapshot.state`.
pub fn render_page(snapshot: &Snapshot) -> String {
    let mut html = String::with_capacity(8 * 1024);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("    <meta charset=\"UTF-8\">\n");
    html.push_str(
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    if snapshot.is_analyzing() {
        html.push_str("    <meta http-equiv=\"refresh\" content=\"2\">\n");
    }
    html.push_str("    <title>Leaf Disease Finder</title>\n    <style>");
    html.push_str(STYLE);
    html.push_str("    </style>\n</head>\n<body>\n<main>\n");

    html.push_str(
        "<header>\n    <h1>🍃 Leaf Disease Finder</h1>\n    \
         <p class=\"subtitle\">Upload a leaf image to diagnose plant diseases with AI</p>\n</header>\n",
    );

    render_uploader(&mut html, snapshot);

    if let Some(error) = &snapshot.error {
        let _ = writeln!(html, "<div class=\"error\" id=\"error\">{}</div>", escape(error));
    }

    match snapshot.state {
        UiState::Analyzing => html.push_str(
            "<div class=\"loading\" id=\"loading\">\n    <div class=\"spinner\"></div>\n    \
             <p>Analyzing leaf... this may take a moment.</p>\n</div>\n",
        ),
        UiState::ResultShown | UiState::ErrorShown => {
            if let Some(result) = &snapshot.result {
                render_card(&mut html, result);
            }
        }
        UiState::NoImage | UiState::ImageSelected => {}
    }

    html.push_str("</main>\n");
    html.push_str(
        "<footer>Powered by Gemini. For informational purposes only. \
         Always consult a professional for critical plant health issues.</footer>\n",
    );
    html.push_str("</body>\n</html>\n");
    html
}

fn render_uploader(html: &mut String, snapshot: &Snapshot) {
    let disabled = if snapshot.is_analyzing() { " disabled" } else { "" };

    html.push_str("<div class=\"uploader\">\n");
    match &snapshot.preview {
        None => {
            let _ = write!(
                html,
                "    <form action=\"/upload\" method=\"post\" enctype=\"multipart/form-data\">\n        \
                 <label for=\"file-upload\"><strong>Click to upload</strong> a leaf image</label>\n        \
                 <input type=\"file\" id=\"file-upload\" name=\"image\" accept=\"image/*\" \
                 onchange=\"this.form.submit()\"{disabled}>\n        \
                 <button type=\"submit\" class=\"btn-primary\"{disabled}>Upload</button>\n    </form>\n"
            );
        }
        Some(preview) => {
            let _ = write!(
                html,
                "    <img id=\"preview\" class=\"preview-image\" src=\"{}\" alt=\"Leaf preview\">\n",
                escape(&preview.url())
            );
            let _ = write!(
                html,
                "    <div class=\"controls\">\n        \
                 <form action=\"/upload\" method=\"post\" enctype=\"multipart/form-data\">\n            \
                 <input type=\"file\" id=\"file-upload\" name=\"image\" accept=\"image/*\" \
                 onchange=\"this.form.submit()\"{disabled}>\n            \
                 <button type=\"submit\" class=\"btn-secondary\"{disabled}>Change Image</button>\n        \
                 </form>\n        \
                 <form action=\"/analyze\" method=\"post\">\n            \
                 <button type=\"submit\" id=\"analyze\" class=\"btn-primary\"{disabled}>Analyze Leaf</button>\n        \
                 </form>\n    </div>\n"
            );
        }
    }
    html.push_str("</div>\n");
}

fn accent_class(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Healthy => "healthy",
        Verdict::Inconclusive => "inconclusive",
        Verdict::Diseased => "diseased",
    }
}

fn render_card(html: &mut String, result: &DiagnosisResult) {
    let _ = writeln!(
        html,
        "<div class=\"card {}\" id=\"result\">",
        accent_class(result.verdict())
    );
    let _ = writeln!(html, "    <h2>{}</h2>", escape(&result.disease_name));
    if let Some(confidence) = result.confidence_label() {
        let _ = writeln!(html, "    <p class=\"confidence\">Confidence: {confidence}</p>");
    }

    html.push_str("    <h3>Description</h3>\n");
    let _ = writeln!(
        html,
        "    <p>{}</p>",
        escape(result.description.as_deref().unwrap_or(""))
    );

    render_list(html, "Possible Causes", result.possible_causes.as_deref());
    render_list(html, "Suggested Treatments", result.suggested_treatments.as_deref());

    html.push_str("</div>\n");
}

fn render_list(html: &mut String, title: &str, items: Option<&[String]>) {
    let Some(items) = items.filter(|items| !items.is_empty()) else {
        return;
    };
    let _ = writeln!(html, "    <h3>{title}</h3>\n    <ul>");
    for item in items {
        let _ = writeln!(html, "        <li>{}</li>", escape(item));
    }
    html.push_str("    </ul>\n");
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
