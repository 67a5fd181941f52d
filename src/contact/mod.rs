//! Contact form: validation, email composition and delivery.

pub mod mailer;
pub mod rate_limit;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

pub use mailer::{Mailer, SmtpMailer};
pub use rate_limit::{ContactRateLimiter, RateLimited};

/// File name of the generated kitchen image when attached to a message.
pub const AI_IMAGE_FILENAME: &str = "cocina-ia.jpg";

/// Body of `POST /api/send-message`. Field names are the form's wire names.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default, rename = "nombre")]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "telefono")]
    pub phone: String,
    #[serde(default, rename = "direccion")]
    pub address: String,
    #[serde(default, rename = "mensaje")]
    pub message: String,
    /// Optional `data:` URL of an image produced by the kitchen generator.
    #[serde(default, rename = "imagenIA")]
    pub ai_image: Option<String>,
}

impl ContactForm {
    /// All text fields are required.
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.email, &self.phone, &self.address, &self.message]
            .iter()
            .all(|f| !f.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A fully composed message, independent of the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub attachment: Option<Attachment>,
}

pub fn compose(form: &ContactForm, from: &str, to: &[String], subject: &str) -> ContactEmail {
    let text = format!(
        "Nombre: {}\nEmail: {}\nTeléfono: {}\nDirección: {}\nMensaje: {}",
        form.name, form.email, form.phone, form.address, form.message
    );
    let html = format!(
        "<p><b>Nombre:</b> {}</p><p><b>Email:</b> {}</p><p><b>Teléfono:</b> {}</p>\
         <p><b>Dirección:</b> {}</p><p><b>Mensaje:</b><br/>{}</p>",
        escape_html(&form.name),
        escape_html(&form.email),
        escape_html(&form.phone),
        escape_html(&form.address),
        escape_html(&form.message).replace('\n', "<br/>"),
    );
    let attachment = form
        .ai_image
        .as_deref()
        .and_then(parse_data_url)
        .map(|(content_type, data)| Attachment {
            filename: AI_IMAGE_FILENAME.to_string(),
            content_type,
            data,
        });

    ContactEmail {
        from: from.to_string(),
        to: to.to_vec(),
        subject: subject.to_string(),
        text,
        html,
        attachment,
    }
}

/// Split `data:<mime>;base64,<payload>` into its MIME type and decoded bytes.
pub fn parse_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    if mime.is_empty() || payload.is_empty() {
        return None;
    }
    let data = STANDARD.decode(payload.trim()).ok()?;
    Some((mime.to_string(), data))
}

/// Encode bytes as a `data:` URL.
pub fn to_data_url(content_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, STANDARD.encode(data))
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> ContactForm {
        ContactForm {
            name: "Ana".into(),
            email: "ana@example.com".into(),
            phone: "+56 9 1234 5678".into(),
            address: "Av. Siempre Viva 123".into(),
            message: "Hola\nquiero una cocina".into(),
            ai_image: None,
        }
    }

    #[test]
    fn test_form_parses_wire_names() {
        let form: ContactForm = serde_json::from_str(
            r#"{"nombre":"Ana","email":"a@b.cl","telefono":"1","direccion":"x","mensaje":"m","imagenIA":"data:image/png;base64,AAAA"}"#,
        )
        .unwrap();
        assert_eq!(form.name, "Ana");
        assert_eq!(form.phone, "1");
        assert!(form.is_complete());
        assert!(form.ai_image.is_some());
    }

    #[test]
    fn test_incomplete_forms() {
        let mut f = form();
        f.address = "   ".into();
        assert!(!f.is_complete());

        let missing: ContactForm = serde_json::from_str(r#"{"nombre":"Ana"}"#).unwrap();
        assert!(!missing.is_complete());
    }

    #[test]
    fn test_compose_bodies() {
        let mut f = form();
        f.message = "<script>x</script>\nline2".into();
        let to = vec!["a@example.com".to_string(), "b@example.com".to_string()];
        let email = compose(&f, "site@example.com", &to, "Subject");

        assert_eq!(email.to.len(), 2);
        assert!(email.text.contains("Teléfono: +56 9 1234 5678"));
        assert!(email.text.contains("<script>x</script>"));
        assert!(email.html.contains("&lt;script&gt;x&lt;/script&gt;<br/>line2"));
        assert!(email.attachment.is_none());
    }

    #[test]
    fn test_compose_attaches_ai_image() {
        let mut f = form();
        f.ai_image = Some(to_data_url("image/jpeg", b"\xff\xd8\xff"));
        let email = compose(&f, "s@example.com", &["a@example.com".to_string()], "S");
        let attachment = email.attachment.unwrap();
        assert_eq!(attachment.filename, AI_IMAGE_FILENAME);
        assert_eq!(attachment.content_type, "image/jpeg");
        assert_eq!(attachment.data, b"\xff\xd8\xff");
    }

    #[test]
    fn test_malformed_data_urls_are_ignored() {
        assert!(parse_data_url("https://example.com/x.jpg").is_none());
        assert!(parse_data_url("data:image/png,AAAA").is_none());
        assert!(parse_data_url("data:;base64,AAAA").is_none());
        assert!(parse_data_url("data:image/png;base64,!!!").is_none());

        let mut f = form();
        f.ai_image = Some("data:image/png;base64,%%%".into());
        assert!(compose(&f, "s@x.cl", &[], "S").attachment.is_none());
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"a & "b" <c> 'd'"#), "a &amp; &quot;b&quot; &lt;c&gt; &#39;d&#39;");
    }
}
