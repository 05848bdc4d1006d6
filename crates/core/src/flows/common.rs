//! Prompts and helpers shared by every flow.

use tracing::{error, warn};

use crate::domain::transaction::{NewTransaction, Transaction};
use crate::errors::FacadeError;
use crate::flows::engine::{FlowContext, FlowOutcome};
use crate::flows::states::FlowKind;
use crate::money::format_rupiah;
use crate::parsers::{classify_confirmation, is_reserved_word, Confirmation};

pub const DEFAULT_DONOR_NAME: &str = "Hamba Allah";

pub const REGISTER_FIRST: &str = "Sebelum melanjutkan, Anda perlu terdaftar sebagai donatur. \
Silakan kirimkan nama lengkap Anda agar kami bisa mendaftarkan nomor ini.";

pub const TRANSACTION_FAILED: &str = "Maaf, transaksi Anda gagal diproses. \
Silakan ulangi dari awal beberapa saat lagi.";

pub const LOOKUP_FAILED: &str = "Maaf, data program sedang tidak dapat dimuat. \
Silakan coba beberapa saat lagi.";

pub const CONFIRM_HINT: &str = "Balas *ya* untuk melanjutkan atau *batal* untuk membatalkan.";

const SELF_WORDS: &[&str] = &["saya", "sendiri", "diri sendiri", "saya sendiri", "untuk saya", "-"];
const MAX_NAME_CHARS: usize = 100;

pub fn cancelled_message(kind: FlowKind) -> String {
    format!(
        "Baik, proses {} dibatalkan. Tidak ada transaksi yang dibuat. \
Silakan kabari kami jika ingin memulai lagi.",
        kind.label()
    )
}

/// `1. first\n2. second` menu body.
pub fn numbered<I>(items: I) -> String
where
    I: IntoIterator<Item = String>,
{
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| format!("{}. {item}", index + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn on_behalf_prompt(subject: &str) -> String {
    format!(
        "{subject} ini atas nama siapa? Ketik namanya, atau balas *saya* jika untuk diri sendiri."
    )
}

/// Reads an on-behalf-of answer. `Ok(None)` means the donor themself.
pub fn parse_on_behalf(input: &str) -> Result<Option<String>, ()> {
    let name = input.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(());
    }
    if SELF_WORDS.contains(&name.to_lowercase().as_str()) {
        return Ok(None);
    }
    if is_reserved_word(name) || !name.chars().any(char::is_alphabetic) {
        return Err(());
    }
    Ok(Some(name.to_string()))
}

pub const ON_BEHALF_INVALID: &str = "Mohon kirimkan nama yang valid (bukan kata perintah \
seperti ya/tidak/batal), atau balas *saya* untuk diri sendiri.";

/// Amount typed for a liability question; "0", "tidak ada" and plain
/// negatives mean nothing is owed.
pub fn parse_optional_amount(input: &str) -> Option<i64> {
    let text = input.trim().to_lowercase();
    if matches!(text.as_str(), "0" | "nol" | "-" | "tidak ada" | "ga ada" | "gak ada" | "nihil") {
        return Some(0);
    }
    if classify_confirmation(&text) == Confirmation::No {
        return Some(0);
    }
    crate::parsers::parse_amount(&text).ok()
}

pub fn confirm_message(title: &str, lines: &[String]) -> String {
    format!("*Konfirmasi {title}*\n\n{}\n\n{CONFIRM_HINT}", lines.join("\n"))
}

pub fn beneficiary_line(on_behalf_of: Option<&str>, donor_name: &str) -> String {
    format!("Atas nama: {}", on_behalf_of.unwrap_or(donor_name))
}

/// Creates the transaction and turns the result into the terminal outcome.
/// Failures are reported once and never retried here.
pub async fn create_transaction(
    ctx: &FlowContext<'_>,
    kind: FlowKind,
    new: NewTransaction,
) -> FlowOutcome {
    match ctx.commerce.transactions.create(new).await {
        Ok(transaction) => FlowOutcome::Completed {
            reply: transaction_summary(&transaction, &ctx.donor.name),
            transaction_number: Some(transaction.transaction_number),
        },
        Err(source) => {
            error!(
                event_name = "flow.transaction_failed",
                phone = %ctx.donor.phone,
                flow = kind.as_str(),
                error = %source,
                "transaction creation failed"
            );
            FlowOutcome::Aborted(TRANSACTION_FAILED.to_string())
        }
    }
}

pub fn lookup_failed(ctx: &FlowContext<'_>, kind: FlowKind, source: &FacadeError) -> String {
    warn!(
        event_name = "flow.lookup_failed",
        phone = %ctx.donor.phone,
        flow = kind.as_str(),
        error = %source,
        "catalog lookup failed"
    );
    LOOKUP_FAILED.to_string()
}

pub fn transaction_summary(transaction: &Transaction, donor_name: &str) -> String {
    let mut lines = vec![
        format!("Terima kasih, {donor_name}! Transaksi Anda sudah kami catat."),
        String::new(),
        format!("No. transaksi: *{}*", transaction.transaction_number),
        format!("Program: {}", transaction.product_name),
    ];
    if transaction.quantity > 1 {
        lines.push(format!(
            "Jumlah: {} x {}",
            transaction.quantity,
            format_rupiah(transaction.unit_price)
        ));
    }
    if transaction.admin_fee > 0 {
        lines.push(format!(
            "Biaya admin: {}",
            format_rupiah(transaction.admin_fee * i64::from(transaction.quantity))
        ));
    }
    if transaction.unique_code > 0 {
        lines.push(format!("Kode unik: {}", transaction.unique_code));
    }
    lines.push(format!("*Total transfer: {}*", format_rupiah(transaction.total_amount)));
    lines.push(String::new());
    lines.push(PAYMENT_CHOICES.to_string());
    lines.join("\n")
}

pub const PAYMENT_CHOICES: &str = "Silakan pilih metode pembayaran:\n\
1. Transfer bank\n\
2. QRIS\n\n\
Setelah membayar, kirimkan foto bukti transfer di sini untuk konfirmasi.";

#[cfg(test)]
mod tests {
    use super::{numbered, parse_on_behalf, parse_optional_amount};

    #[test]
    fn on_behalf_accepts_names_and_self_words() {
        assert_eq!(parse_on_behalf("Ahmad"), Ok(Some("Ahmad".to_string())));
        assert_eq!(parse_on_behalf("  Saya "), Ok(None));
        assert_eq!(parse_on_behalf("-"), Ok(None));
    }

    #[test]
    fn on_behalf_rejects_control_words() {
        assert!(parse_on_behalf("ya").is_err());
        assert!(parse_on_behalf("tidak").is_err());
        assert!(parse_on_behalf("12345").is_err());
        assert!(parse_on_behalf("").is_err());
    }

    #[test]
    fn liabilities_accept_explicit_zero() {
        assert_eq!(parse_optional_amount("tidak ada"), Some(0));
        assert_eq!(parse_optional_amount("0"), Some(0));
        assert_eq!(parse_optional_amount("5jt"), Some(5_000_000));
        assert_eq!(parse_optional_amount("banyak"), None);
    }

    #[test]
    fn menu_is_one_based() {
        let menu = numbered(vec!["Sapi".to_string(), "Kambing".to_string()]);
        assert_eq!(menu, "1. Sapi\n2. Kambing");
    }
}
