use amanah_core::flows::{FlowKind, REGISTER_FIRST};

pub const PROOF_REQUEST: &str = "Untuk konfirmasi pembayaran, silakan kirimkan foto bukti \
transfer beserta nomor transaksinya di chat ini. Tim kami akan memverifikasinya secepatnya.";

pub const ATTACH_PROOF: &str = "Mohon lampirkan foto bukti transfer pada pesan Anda agar \
pembayaran dapat kami konfirmasi.";

/// A sentence pairing one of these subjects with one of the verbs below
/// asserts that a payment arrived. Only the confirmation tool may say that.
const PAYMENT_SUBJECTS: &[&str] =
    &["pembayaran", "transfer", "donasi", "zakat", "dana", "infaq", "sedekah", "payment"];

const PAYMENT_VERBS: &[&str] = &[
    "diterima",
    "terima",
    "menerima",
    "berhasil",
    "sukses",
    "terverifikasi",
    "diverifikasi",
    "dikonfirmasi",
    "terkonfirmasi",
    "masuk",
    "lunas",
    "received",
    "verified",
    "confirmed",
    "successful",
];

/// Words that turn a claim around ("belum diterima").
const NEGATIONS: &[&str] = &["belum", "tidak", "tak", "gagal", "bukan", "not"];

/// How many tokens before a verb are searched for a negation.
const NEGATION_REACH: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailIntent<'a> {
    StartFlow { kind: FlowKind, donor_registered: bool },
    ConfirmPayment { has_image: bool },
    Reply { text: &'a str },
}

impl GuardrailIntent<'_> {
    pub fn action_key(&self) -> String {
        match self {
            Self::StartFlow { kind, .. } => format!("flow.start.{}", kind.as_str()),
            Self::ConfirmPayment { .. } => "payment.confirm".to_string(),
            Self::Reply { .. } => "reply".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    /// The action does not run; `user_message` is returned to the model as
    /// the tool result.
    Deny { reason_code: &'static str, user_message: String, fallback_path: &'static str },
    /// The action's output is replaced by `user_message`.
    Degrade { reason_code: &'static str, user_message: String, fallback_path: &'static str },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub payment_subjects: Vec<String>,
    pub payment_verbs: Vec<String>,
    pub require_registration_for_flows: bool,
    pub require_image_for_confirmation: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self {
            payment_subjects: PAYMENT_SUBJECTS.iter().map(|word| word.to_string()).collect(),
            payment_verbs: PAYMENT_VERBS.iter().map(|word| word.to_string()).collect(),
            require_registration_for_flows: true,
            require_image_for_confirmation: true,
        }
    }
}

impl GuardrailPolicy {
    pub fn evaluate(&self, intent: &GuardrailIntent<'_>) -> GuardrailDecision {
        match intent {
            GuardrailIntent::StartFlow { donor_registered: false, .. }
                if self.require_registration_for_flows =>
            {
                GuardrailDecision::Deny {
                    reason_code: "donor_not_registered",
                    user_message: REGISTER_FIRST.to_string(),
                    fallback_path: "register_donor",
                }
            }
            GuardrailIntent::ConfirmPayment { has_image: false }
                if self.require_image_for_confirmation =>
            {
                GuardrailDecision::Deny {
                    reason_code: "proof_image_missing",
                    user_message: ATTACH_PROOF.to_string(),
                    fallback_path: "request_proof_image",
                }
            }
            GuardrailIntent::Reply { text } if self.claims_payment(text) => {
                GuardrailDecision::Degrade {
                    reason_code: "unverified_payment_claim",
                    user_message: PROOF_REQUEST.to_string(),
                    fallback_path: "request_proof_of_transfer",
                }
            }
            _ => GuardrailDecision::Allow,
        }
    }

    /// True when any sentence of `text` pairs a payment subject with a
    /// receipt verb that is not negated, in either order and with any words
    /// in between ("donasi Anda telah kami terima").
    pub fn claims_payment(&self, text: &str) -> bool {
        sentences(text).iter().any(|sentence| self.sentence_claims_payment(sentence))
    }

    fn sentence_claims_payment(&self, tokens: &[String]) -> bool {
        if !tokens.iter().any(|token| self.is_payment_subject(token)) {
            return false;
        }

        tokens.iter().enumerate().any(|(index, token)| {
            if !self.payment_verbs.iter().any(|verb| verb == token) {
                return false;
            }
            if token == "terima" && tokens.get(index + 1).is_some_and(|next| next == "kasih") {
                return false;
            }
            let reach = index.saturating_sub(NEGATION_REACH);
            !tokens[reach..index].iter().any(|word| NEGATIONS.contains(&word.as_str()))
        })
    }

    /// Accepts possessive forms such as "pembayarannya" or "donasimu".
    fn is_payment_subject(&self, token: &str) -> bool {
        self.payment_subjects.iter().any(|subject| {
            token
                .strip_prefix(subject.as_str())
                .is_some_and(|suffix| matches!(suffix, "" | "nya" | "mu" | "ku"))
        })
    }
}

/// Splits on sentence punctuation and line breaks, then lowercases each
/// sentence into alphanumeric tokens. A dot between digits ("Rp1.500.000")
/// does not end a sentence.
fn sentences(text: &str) -> Vec<Vec<String>> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut current = String::new();

    for (index, &ch) in chars.iter().enumerate() {
        let ends_sentence = match ch {
            '!' | '?' | '\n' | ';' => true,
            '.' => !chars.get(index + 1).is_some_and(|next| next.is_ascii_digit()),
            _ => false,
        };
        if ends_sentence {
            sentences.push(tokens(&current));
            current.clear();
        } else {
            current.push(ch);
        }
    }
    sentences.push(tokens(&current));
    sentences.retain(|sentence| !sentence.is_empty());
    sentences
}

fn tokens(sentence: &str) -> Vec<String> {
    sentence
        .to_lowercase()
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use amanah_core::flows::FlowKind;

    use super::{GuardrailDecision, GuardrailIntent, GuardrailPolicy, ATTACH_PROOF, PROOF_REQUEST};

    #[test]
    fn registered_donor_may_start_a_flow() {
        let policy = GuardrailPolicy::default();
        let decision = policy.evaluate(&GuardrailIntent::StartFlow {
            kind: FlowKind::Qurban,
            donor_registered: true,
        });
        assert_eq!(decision, GuardrailDecision::Allow);
    }

    #[test]
    fn unregistered_donor_is_sent_to_registration() {
        let policy = GuardrailPolicy::default();
        let decision = policy.evaluate(&GuardrailIntent::StartFlow {
            kind: FlowKind::Zakat,
            donor_registered: false,
        });

        let GuardrailDecision::Deny { reason_code, user_message, fallback_path } = decision else {
            panic!("expected a denial");
        };
        assert_eq!(reason_code, "donor_not_registered");
        assert!(user_message.contains("terdaftar"));
        assert_eq!(fallback_path, "register_donor");
    }

    #[test]
    fn confirmation_without_image_is_denied() {
        let policy = GuardrailPolicy::default();

        let denied = policy.evaluate(&GuardrailIntent::ConfirmPayment { has_image: false });
        assert!(matches!(
            denied,
            GuardrailDecision::Deny { ref user_message, .. } if user_message == ATTACH_PROOF
        ));
        assert_eq!(
            policy.evaluate(&GuardrailIntent::ConfirmPayment { has_image: true }),
            GuardrailDecision::Allow
        );
    }

    #[test]
    fn payment_claims_in_replies_are_degraded() {
        let policy = GuardrailPolicy::default();

        for text in [
            "Alhamdulillah, pembayaran diterima. Terima kasih!",
            "Pembayaran Anda sudah kami terima.",
            "PEMBAYARAN   BERHASIL!!",
            "Donasi sudah masuk ya kak",
            "Pembayaran Anda sudah diterima, terima kasih!",
            "Alhamdulillah, donasi Anda telah kami terima.",
            "Pembayaran Anda berhasil dan sudah terverifikasi.",
            "Transfer Anda telah kami terima.",
            "Zakat Anda telah kami terima, jazakallah.",
            "Kami sudah menerima pembayarannya.",
            "Pembayaran Rp1.500.000 sudah lunas.",
        ] {
            let decision = policy.evaluate(&GuardrailIntent::Reply { text });
            let GuardrailDecision::Degrade { reason_code, user_message, .. } = decision else {
                panic!("`{text}` should be degraded");
            };
            assert_eq!(reason_code, "unverified_payment_claim");
            assert_eq!(user_message, PROOF_REQUEST);
        }
    }

    #[test]
    fn negated_or_unrelated_receipts_are_not_claims() {
        let policy = GuardrailPolicy::default();

        for text in [
            "Pembayaran Anda belum kami terima. Silakan kirim bukti transfer.",
            "Silakan lakukan pembayaran. Terima kasih!",
            "Pembayaran dapat dilakukan via transfer, terima kasih sudah berdonasi.",
            "Pendaftaran berhasil. Mau zakat atau donasi?",
            "Gambar sudah kami terima. Ada yang bisa dibantu?",
        ] {
            assert!(!policy.claims_payment(text), "`{text}` is not a payment claim");
        }
    }

    #[test]
    fn ordinary_replies_pass_through() {
        let policy = GuardrailPolicy::default();
        let decision = policy.evaluate(&GuardrailIntent::Reply {
            text: "Silakan transfer ke rekening BSI lalu kirim foto bukti transfernya.",
        });
        assert_eq!(decision, GuardrailDecision::Allow);
        assert_eq!(
            GuardrailIntent::StartFlow { kind: FlowKind::Fidyah, donor_registered: true }
                .action_key(),
            "flow.start.fidyah"
        );
    }
}
