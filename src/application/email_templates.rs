use chrono::{DateTime, Utc};

const BRAND_NAME: &str = "Subscriptions";

fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn detail_row(label: &str, value: &str) -> String {
    format!(
        r#"<tr><td style="padding:4px 12px 4px 0;color:#6b7280;font-size:14px;">{label}</td><td style="padding:4px 0;color:#111827;font-size:14px;">{value}</td></tr>"#
    )
}

pub struct RenewalEmailDetails<'a> {
    pub order_id: i64,
    pub product_name: &'a str,
    pub quantity: i32,
    pub total_cents: Option<i64>,
    pub payment_method: &'a str,
    pub next_shipment_date: DateTime<Utc>,
}

pub fn renewal_confirmation_email(details: &RenewalEmailDetails<'_>) -> (String, String) {
    let subject = "Order Confirmation".to_string();
    let headline = "Your subscription order is on its way";
    let lead = format!(
        "Your order has been placed successfully. Order ID: <strong>{}</strong>",
        details.order_id
    );

    let mut rows = vec![
        detail_row("Product", &escape_html(details.product_name)),
        detail_row("Quantity", &details.quantity.to_string()),
        detail_row("Payment", &escape_html(details.payment_method)),
    ];
    if let Some(total) = details.total_cents {
        rows.push(detail_row("Total", &format_cents(total)));
    }
    rows.push(detail_row(
        "Next renewal",
        &details.next_shipment_date.format("%B %-d, %Y").to_string(),
    ));

    let body = format!(
        r#"<table style="margin:12px 0 0;border-collapse:collapse;">{}</table>"#,
        rows.join("")
    );
    let reason = "you have an active subscription";

    let html = wrap_email(headline, &lead, &body, reason);
    (subject, html)
}

pub fn wrap_email(headline: &str, lead: &str, body_html: &str, reason: &str) -> String {
    let reason_label = "Why you got this email";

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <body style="background:#f8fafc;margin:0;padding:24px;font-family:Arial,Helvetica,sans-serif;">
    <div style="max-width:560px;margin:0 auto;background:#ffffff;border:1px solid #e5e7eb;border-radius:12px;padding:24px;box-shadow:0 8px 30px rgba(0,0,0,0.04);">
      <div style="font-size:12px;letter-spacing:0.08em;text-transform:uppercase;color:#6b7280;">{brand}</div>
      <h1 style="margin:12px 0 8px;font-size:22px;color:#111827;">{headline}</h1>
      <p style="margin:0 0 12px;font-size:15px;color:#111827;line-height:1.6;">{lead}</p>
      {body_html}
      <div style="margin-top:20px;padding-top:16px;border-top:1px solid #e5e7eb;">
        <p style="margin:0;font-size:13px;color:#4b5563;">{reason_label}: {reason}.</p>
      </div>
    </div>
  </body>
</html>
"#,
        brand = BRAND_NAME,
        headline = headline,
        lead = lead,
        body_html = body_html,
        reason = reason,
        reason_label = reason_label,
    )
}
