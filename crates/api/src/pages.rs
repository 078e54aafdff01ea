use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use raithu_core::domain::query::{Crop, Location, Unit, DEFAULT_QUANTITY};
use raithu_core::llm::SpeechAudio;
use raithu_core::render::{FailureNotice, RecommendationCard};
use raithu_core::session::{ChatMessage, MessageBody, Sender, Session, View};

const STYLE: &str = "
body { margin: 0; background: #f1f5f9; font-family: Inter, 'Noto Sans Telugu', sans-serif; color: #334155; }
.app { max-width: 520px; margin: 0 auto; min-height: 100vh; background: #f8fafc; box-shadow: 0 0 50px rgba(0,0,0,0.1); }
header { background: #047857; color: white; padding: 16px 20px; display: flex; justify-content: space-between; align-items: center; }
header h1 { margin: 0; font-size: 20px; font-weight: 900; }
.status { font-size: 10px; font-weight: 800; letter-spacing: 1px; text-transform: uppercase; color: #a7f3d0; }
.toggle a { padding: 6px 14px; border-radius: 8px; font-size: 12px; font-weight: 700; text-decoration: none; color: rgba(255,255,255,0.6); }
.toggle a.active { background: white; color: #065f46; }
main { padding: 16px; }
.bubble { background: white; padding: 14px 18px; border-radius: 22px; margin: 8px 0 2px; max-width: 90%; white-space: pre-line; }
.bubble.user { background: #059669; color: white; margin-left: auto; }
.time { font-size: 9px; font-weight: 700; color: #94a3b8; text-align: right; margin-bottom: 14px; }
.card { background: white; border-radius: 24px; overflow: hidden; box-shadow: 0 10px 25px rgba(0,0,0,0.08); margin: 8px 0; }
.card-head { color: white; padding: 20px; display: flex; justify-content: space-between; align-items: center; }
.card-head h3 { margin: 0; font-size: 18px; font-weight: 900; }
.verdict { background: white; color: #111827; padding: 8px 16px; border-radius: 16px; font-weight: 900; font-size: 13px; }
.card-body { padding: 20px; }
.prices { display: grid; grid-template-columns: 1fr 1fr; gap: 12px; }
.price { background: #f8fafc; border-radius: 16px; padding: 12px; }
.label { font-size: 10px; font-weight: 900; color: #94a3b8; text-transform: uppercase; letter-spacing: 1px; }
.amount { font-size: 22px; font-weight: 900; }
.profit { background: #ecfdf5; border-radius: 16px; padding: 12px; margin-top: 12px; }
.profit .amount { color: #059669; }
.risk { color: white; padding: 2px 8px; border-radius: 8px; font-size: 10px; font-weight: 900; }
.explanation { font-weight: 700; margin: 16px 0 4px; }
.muted { color: #94a3b8; font-size: 13px; }
.trend { width: 100%; font-size: 12px; margin-top: 12px; }
.sources a { font-size: 9px; font-weight: 900; color: #64748b; background: #f1f5f9; padding: 6px 12px; border-radius: 12px; text-decoration: none; margin-right: 6px; }
.failure { background: #fff1f2; color: #9f1239; border-radius: 22px; padding: 14px 18px; margin: 8px 0 2px; }
.notice { background: #fef3c7; color: #92400e; border-radius: 12px; padding: 10px 14px; margin-bottom: 12px; }
form { background: white; border-radius: 16px; padding: 20px; border: 2px solid #dcfce7; }
form label { display: block; font-size: 13px; font-weight: 700; margin: 12px 0 6px; }
form select, form input { width: 100%; padding: 10px; border-radius: 12px; border: 1px solid #e5e7eb; background: #f9fafb; box-sizing: border-box; }
.chat-input { display: flex; flex-wrap: wrap; gap: 8px; padding: 12px; border-color: #e2e8f0; margin-top: 16px; }
.chat-input input[type=text] { flex: 1 1 60%; }
.chat-input input[type=file] { flex: 1 1 100%; }
.chat-input button { margin-top: 0; width: auto; padding: 10px 16px; }
form button { width: 100%; margin-top: 18px; padding: 14px; border: 0; border-radius: 12px; background: #16a34a; color: white; font-size: 16px; font-weight: 700; }
";

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Full page for the session's current view. `audio` plays under the conversation.
pub fn page(session: &Session, audio: Option<&SpeechAudio>, notice: Option<&str>) -> String {
    let notice = notice
        .map(|n| format!("<div class=\"notice\">{}</div>", escape_html(n)))
        .unwrap_or_default();
    let body = match session.view {
        View::Chat => chat_view(session, audio),
        View::Form => form_view(),
    };

    format!(
        "<!doctype html>\n<html lang=\"te\">\n<head>\n<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>Raithu AI</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<div class=\"app\">\n\
{header}\n<main>\n{notice}{body}</main>\n</div>\n</body>\n</html>\n",
        header = header(session.view),
    )
}

fn header(view: View) -> String {
    let active = |v: View| if v == view { "active" } else { "" };
    format!(
        "<header><div><h1>Raithu AI</h1><div class=\"status\">Live Market Engine</div></div>\
<nav class=\"toggle\"><a class=\"{}\" href=\"/?view=chat\">Chat</a><a class=\"{}\" href=\"/?view=form\">Form</a></nav></header>",
        active(View::Chat),
        active(View::Form),
    )
}

fn chat_view(session: &Session, audio: Option<&SpeechAudio>) -> String {
    let mut out = String::new();
    for msg in &session.messages {
        out.push_str(&message(msg));
    }
    if let Some(audio) = audio {
        out.push_str(&audio_player(audio));
    }
    out.push_str(CHAT_INPUT);
    out
}

const CHAT_INPUT: &str = "<form class=\"chat-input\" method=\"post\" action=\"/chat\" enctype=\"multipart/form-data\">\
<input name=\"message\" type=\"text\" autocomplete=\"off\" placeholder=\"Price for 50 KG of Tomato in Warangal\">\
<input name=\"image\" type=\"file\" accept=\"image/jpeg,image/png\">\
<button type=\"submit\">Send (పంపండి)</button></form>\n";

pub fn message(msg: &ChatMessage) -> String {
    let inner = match &msg.body {
        MessageBody::Text { text } => {
            let class = match msg.sender {
                Sender::User => "bubble user",
                Sender::Ai => "bubble",
            };
            let photo = if msg.has_image { " 📷" } else { "" };
            format!("<div class=\"{class}\">{}{photo}</div>", escape_html(text))
        }
        MessageBody::Prediction { card: c } => {
            format!(
                "<div class=\"bubble\">{}</div>{}",
                escape_html(&c.advisory),
                card(c)
            )
        }
        MessageBody::Failure { notice } => failure(notice),
    };
    format!(
        "{inner}<div class=\"time\">{}</div>\n",
        escape_html(&msg.clock())
    )
}

pub fn card(card: &RecommendationCard) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "<div class=\"card\"><div class=\"card-head\" style=\"background:{accent}\">\
<div><h3>{title}</h3><div class=\"status\">Verified Live Mandi Data</div></div>\
<div class=\"verdict\">{headline}</div></div><div class=\"card-body\">",
        accent = card.accent_color,
        title = escape_html(&card.title),
        headline = escape_html(card.headline),
    ));

    if let Some(quality) = &card.quality {
        out.push_str(&format!(
            "<div class=\"price\"><div class=\"label\">Quality Assessment &middot; Grade {}</div><div>{}</div></div>",
            escape_html(&quality.grade),
            escape_html(quality.assessment.as_deref().unwrap_or_default()),
        ));
    }

    out.push_str(&format!(
        "<div class=\"prices\">\
<div class=\"price\"><div class=\"label\">Current Price</div><div class=\"amount\">{}</div></div>\
<div class=\"price\"><div class=\"label\">Target Price</div><div class=\"amount\">{}</div></div></div>",
        escape_html(&card.current_price),
        escape_html(&card.predicted_price),
    ));

    if let Some(profit) = &card.profit_line {
        out.push_str(&format!(
            "<div class=\"profit\"><div class=\"label\">Potential Extra Profit</div><div class=\"amount\">{}</div></div>",
            escape_html(profit)
        ));
    }

    out.push_str(&format!(
        "<p class=\"explanation\">{}</p><p class=\"muted\">{}</p>",
        escape_html(&card.explanation_primary),
        escape_html(&card.explanation_secondary),
    ));

    out.push_str(&format!(
        "<div><span class=\"label\">Risk:</span> <span class=\"risk\" style=\"background:{}\">{}</span></div>",
        card.risk_color, card.risk
    ));

    if !card.trend.is_empty() {
        out.push_str("<table class=\"trend\"><tr><th class=\"label\">7-Day Prediction Trend</th><th></th></tr>");
        for row in &card.trend {
            out.push_str(&format!(
                "<tr><td>{}</td><td>{}</td></tr>",
                escape_html(&row.day),
                escape_html(&row.price)
            ));
        }
        out.push_str("</table>");
    }

    if !card.sources.is_empty() {
        out.push_str("<p class=\"sources\">");
        for source in &card.sources {
            out.push_str(&format!(
                "<a href=\"{}\" title=\"{}\" target=\"_blank\" rel=\"noreferrer\">{}</a>",
                escape_html(&source.uri),
                escape_html(&source.title),
                escape_html(&source.label),
            ));
        }
        out.push_str("</p>");
    }

    out.push_str("</div></div>");
    out
}

pub fn failure(notice: &FailureNotice) -> String {
    format!(
        "<div class=\"failure\">{}<br>{}</div>",
        escape_html(notice.localized),
        escape_html(notice.message)
    )
}

fn audio_player(audio: &SpeechAudio) -> String {
    format!(
        "<audio controls autoplay src=\"data:{};base64,{}\"></audio>\n",
        audio.mime_type,
        BASE64.encode(&audio.bytes)
    )
}

fn options<T: Copy + PartialEq>(
    items: &[T],
    selected: Option<T>,
    value: impl Fn(T) -> &'static str,
    label: impl Fn(T) -> String,
) -> String {
    items
        .iter()
        .map(|item| {
            let sel = if Some(*item) == selected { " selected" } else { "" };
            format!(
                "<option value=\"{}\"{sel}>{}</option>",
                value(*item),
                escape_html(&label(*item))
            )
        })
        .collect()
}

pub fn form_view() -> String {
    format!(
        "<form method=\"post\" action=\"/advice\" enctype=\"multipart/form-data\">\
<h2>New Selling Advice</h2>\
<label for=\"crop\">Crop Name (పంట పేరు)</label><select id=\"crop\" name=\"crop\" required>{crops}</select>\
<label for=\"location\">Location (ప్రాంతం)</label><select id=\"location\" name=\"location\" required>{locations}</select>\
<label for=\"quantity\">Quantity (పరిమాణం)</label><input id=\"quantity\" name=\"quantity\" type=\"number\" min=\"1\" step=\"1\" value=\"{DEFAULT_QUANTITY}\" required>\
<label for=\"unit\">Unit</label><select id=\"unit\" name=\"unit\">{units}</select>\
<label for=\"image\">Crop photo (optional)</label><input id=\"image\" name=\"image\" type=\"file\" accept=\"image/jpeg,image/png\">\
<button type=\"submit\">Get Market Advice (సలహా పొందండి)</button></form>",
        crops = options(&Crop::ALL, None, Crop::name, Crop::label),
        locations = options(&Location::ALL, None, Location::name, |l| l.name().to_string()),
        units = options(&Unit::ALL, Some(Unit::Quintal), Unit::label, |u| u.label().to_string()),
    )
}
