use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tera::{Context, Tera};

use amanah_core::money::format_rupiah;

const TEMPLATE_NAME: &str = "system_prompt";

const TEMPLATE: &str = r#"Anda adalah asisten layanan donatur lembaga amil zakat melalui WhatsApp.
Tanggal hari ini: {{ today }}.
Jawab selalu dalam Bahasa Indonesia yang sopan, singkat, dan jelas.

Donatur: {% if registered %}{{ donor_name }} (terdaftar){% else %}belum terdaftar{% if donor_name %}, nama profil WhatsApp "{{ donor_name }}"{% endif %}{% endif %}, nomor {{ phone }}.
{% if has_image %}Pesan ini membawa lampiran gambar. Jika itu bukti transfer, panggil confirm_payment.
{% endif %}
Aturan:
- Gunakan tool untuk setiap data program, zakat, transaksi, tabungan, dan rekening. Jangan mengarang angka, nomor rekening, atau nomor transaksi.
- Untuk membayar zakat, berdonasi, fidyah, qurban, membuka tabungan qurban, atau menyetor tabungan, panggil tool start_* yang sesuai. Perhitungan dan pembuatan transaksi dilakukan oleh sistem, bukan oleh Anda.
{% if not registered %}- Donatur harus mendaftar sebelum bertransaksi. Tanyakan nama lengkapnya{% if donor_name %} (tawarkan "{{ donor_name }}" dari profil WhatsApp){% endif %} lalu panggil register_donor.
{% endif %}- Jangan pernah menyatakan pembayaran sudah diterima atau terverifikasi. Minta donatur mengirim foto bukti transfer.
- Minimal donasi {{ min_donation | rupiah }}.
- Akhiri setiap giliran dengan tool reply berisi pesan untuk donatur."#;

/// Values the system prompt is rendered with.
#[derive(Clone, Debug, Serialize)]
pub struct PromptContext {
    pub today: String,
    pub phone: String,
    pub donor_name: String,
    pub registered: bool,
    pub has_image: bool,
    pub min_donation: i64,
}

impl PromptContext {
    pub fn new(date: NaiveDate, phone: &str) -> Self {
        Self {
            today: date.format("%d-%m-%Y").to_string(),
            phone: phone.to_string(),
            donor_name: String::new(),
            registered: false,
            has_image: false,
            min_donation: 0,
        }
    }
}

pub struct SystemPrompt {
    tera: Tera,
}

impl SystemPrompt {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.register_filter("rupiah", rupiah_filter);
        tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)?;
        Ok(Self { tera })
    }

    pub fn render(&self, context: &PromptContext) -> Result<String, tera::Error> {
        self.tera.render(TEMPLATE_NAME, &Context::from_serialize(context)?)
    }
}

/// `150000 | rupiah` renders `Rp150.000`.
fn rupiah_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let amount = value
        .as_i64()
        .ok_or_else(|| tera::Error::msg("rupiah filter expects an integer amount"))?;
    Ok(tera::Value::String(format_rupiah(amount)))
}
