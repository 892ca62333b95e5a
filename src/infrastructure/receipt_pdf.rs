use crate::domain::enrollment::Enrollment;
use crate::domain::payment::{Payment, PaymentMethod};
use crate::domain::ports::ReceiptRenderer;
use crate::error::{LedgerError, Result};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use qrcode::QrCode;

/// Fixed-layout PDF receipt renderer.
///
/// Renders entirely in memory and returns the finished bytes, so a failure
/// can never leave a truncated artifact behind. The QR block encodes the
/// enrollment's public URL and is drawn as a monospaced module grid.
pub struct PdfReceiptRenderer {
    institution: String,
}

impl Default for PdfReceiptRenderer {
    fn default() -> Self {
        Self::new("ESFE - Ecole Superieure de Formation")
    }
}

impl PdfReceiptRenderer {
    pub fn new(institution: &str) -> Self {
        Self {
            institution: institution.to_string(),
        }
    }

    fn method_label(method: PaymentMethod) -> &'static str {
        match method {
            PaymentMethod::Cash => "cash",
            PaymentMethod::MobileMoney => "mobile money",
            PaymentMethod::BankTransfer => "bank transfer",
        }
    }
}

impl ReceiptRenderer for PdfReceiptRenderer {
    fn render(&self, payment: &Payment, enrollment: &Enrollment, public_url: &str) -> Result<Vec<u8>> {
        let qr = QrCode::new(public_url.as_bytes())
            .map_err(|e| LedgerError::ReceiptRender(format!("QR encoding: {e}")))?;
        let qr_block = qr
            .render::<char>()
            .quiet_zone(false)
            .module_dimensions(2, 1)
            .dark_color('#')
            .light_color(' ')
            .build();

        let (doc, page, layer) = PdfDocument::new("Payment receipt", Mm(210.0), Mm(297.0), "receipt");
        let helvetica = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| LedgerError::ReceiptRender(e.to_string()))?;
        let courier = doc
            .add_builtin_font(BuiltinFont::Courier)
            .map_err(|e| LedgerError::ReceiptRender(e.to_string()))?;

        let layer = doc.get_page(page).get_layer(layer);

        let mut y = 275.0_f32;
        let mut line = |text: String, size: f32, step: f32| {
            layer.use_text(text, size.into(), Mm(20.0), Mm(y), &helvetica);
            y -= step;
        };

        line(self.institution.clone(), 16.0, 10.0);
        line("PAYMENT RECEIPT".to_string(), 13.0, 12.0);
        line(
            format!(
                "Receipt no: {}",
                payment
                    .receipt_number
                    .as_ref()
                    .map(|n| n.to_string())
                    .unwrap_or_default()
            ),
            11.0,
            7.0,
        );
        line(format!("Enrollment: {}", enrollment.reference), 11.0, 7.0);
        line(
            format!("Amount: {} FCFA", payment.amount.value()),
            11.0,
            7.0,
        );
        line(
            format!("Method: {}", Self::method_label(payment.method)),
            11.0,
            7.0,
        );
        line(
            format!("Paid at: {}", payment.paid_at.format("%Y-%m-%d %H:%M UTC")),
            11.0,
            7.0,
        );
        line(
            format!(
                "Amount due: {} FCFA / paid: {} FCFA",
                enrollment.amount_due.0, enrollment.amount_paid.0
            ),
            11.0,
            12.0,
        );
        line("Scan to consult the enrollment file:".to_string(), 10.0, 6.0);

        for row in qr_block.lines() {
            layer.use_text(row.to_string(), 6.0, Mm(20.0), Mm(y), &courier);
            y -= 2.2;
        }
        layer.use_text(public_url.to_string(), 8.0, Mm(20.0), Mm(y - 4.0), &helvetica);

        doc.save_to_bytes()
            .map_err(|e| LedgerError::ReceiptRender(e.to_string()))
    }
}
