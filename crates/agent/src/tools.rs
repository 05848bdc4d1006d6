//! The closed tool catalog exposed to the model.
//!
//! [`ToolName`] is the source of truth; the JSON schema in [`ToolSpec`] is
//! only serialization metadata for providers. Invocations are parsed into a
//! typed [`ToolCall`] before anything executes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use amanah_channel::OutboundImage;
use amanah_core::commerce::Commerce;
use amanah_core::domain::catalog::{PeriodId, ProductId, ZakatKind};
use amanah_core::domain::donor::DonorId;
use amanah_core::errors::{ApplicationError, FacadeError};
use amanah_core::flows::{FlowStart, REGISTER_FIRST};
use amanah_core::money::format_rupiah;
use amanah_core::parsers::parse_amount;

use crate::llm::ToolInvocation;

const RECENT_TRANSACTIONS: usize = 5;
const PROOF_HINT: &str =
    "Setelah membayar, kirimkan foto bukti transfer beserta nomor transaksinya.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolName {
    SearchPrograms,
    GetProgramDetail,
    GetZakatMenu,
    CheckTransactionStatus,
    CheckSavingsStatus,
    GetPaymentMethods,
    RegisterDonor,
    ConfirmPayment,
    StartZakat,
    StartDonation,
    StartFidyah,
    StartQurban,
    StartQurbanSavings,
    StartSavingsDeposit,
    Reply,
}

impl ToolName {
    pub const ALL: [ToolName; 15] = [
        Self::SearchPrograms,
        Self::GetProgramDetail,
        Self::GetZakatMenu,
        Self::CheckTransactionStatus,
        Self::CheckSavingsStatus,
        Self::GetPaymentMethods,
        Self::RegisterDonor,
        Self::ConfirmPayment,
        Self::StartZakat,
        Self::StartDonation,
        Self::StartFidyah,
        Self::StartQurban,
        Self::StartQurbanSavings,
        Self::StartSavingsDeposit,
        Self::Reply,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchPrograms => "search_programs",
            Self::GetProgramDetail => "get_program_detail",
            Self::GetZakatMenu => "get_zakat_menu",
            Self::CheckTransactionStatus => "check_transaction_status",
            Self::CheckSavingsStatus => "check_savings_status",
            Self::GetPaymentMethods => "get_payment_methods",
            Self::RegisterDonor => "register_donor",
            Self::ConfirmPayment => "confirm_payment",
            Self::StartZakat => "start_zakat",
            Self::StartDonation => "start_donation",
            Self::StartFidyah => "start_fidyah",
            Self::StartQurban => "start_qurban",
            Self::StartQurbanSavings => "start_qurban_savings",
            Self::StartSavingsDeposit => "start_savings_deposit",
            Self::Reply => "reply",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name.trim())
    }

    pub fn is_flow_start(&self) -> bool {
        matches!(
            self,
            Self::StartZakat
                | Self::StartDonation
                | Self::StartFidyah
                | Self::StartQurban
                | Self::StartQurbanSavings
                | Self::StartSavingsDeposit
        )
    }

    fn description(&self) -> &'static str {
        match self {
            Self::SearchPrograms => {
                "Search active donation campaigns by keyword. Use an empty query to list all."
            }
            Self::GetProgramDetail => "Show the details of one donation campaign by its id.",
            Self::GetZakatMenu => {
                "List zakat types with their rates and programs, optionally for one zakat type."
            }
            Self::CheckTransactionStatus => {
                "Look up a transaction by number, or the donor's recent transactions when no \
                 number is given."
            }
            Self::CheckSavingsStatus => "Show the donor's active qurban savings plans.",
            Self::GetPaymentMethods => {
                "Show bank transfer accounts and the QRIS code. The QRIS image is attached to \
                 the reply automatically."
            }
            Self::RegisterDonor => {
                "Register the sender's phone number as a donor. Ask for the full name first."
            }
            Self::ConfirmPayment => {
                "Submit the image attached to the current message as proof of transfer. Only \
                 call this when the donor sent a photo of the transfer."
            }
            Self::StartZakat => {
                "Start the guided zakat payment. Pass zakat_type when the donor named one and \
                 amount when they already know how much zakat they owe."
            }
            Self::StartDonation => "Start the guided donation to one campaign.",
            Self::StartFidyah => "Start the guided fidyah payment.",
            Self::StartQurban => "Start the guided qurban order.",
            Self::StartQurbanSavings => "Open a new qurban savings plan (tabungan qurban).",
            Self::StartSavingsDeposit => {
                "Start a deposit into one of the donor's qurban savings plans."
            }
            Self::Reply => {
                "Send a plain text message to the donor. Never use it to claim a payment was \
                 received or verified."
            }
        }
    }

    fn parameters(&self) -> Value {
        let zakat_types: Vec<&str> = ZakatKind::ALL.iter().map(ZakatKind::as_str).collect();
        let amount = json!({
            "type": ["number", "string"],
            "description": "Amount in rupiah, e.g. 150000 or \"1,5 juta\"."
        });
        match self {
            Self::SearchPrograms => object(
                json!({ "query": { "type": "string", "description": "Keyword, may be empty." } }),
                &[],
            ),
            Self::GetProgramDetail => object(
                json!({ "program_id": { "type": "string", "description": "Campaign id." } }),
                &["program_id"],
            ),
            Self::GetZakatMenu => object(
                json!({ "zakat_type": { "type": "string", "enum": zakat_types } }),
                &[],
            ),
            Self::CheckTransactionStatus | Self::ConfirmPayment => object(
                json!({
                    "transaction_number": {
                        "type": "string",
                        "description": "Transaction number, e.g. AMN-20260301-00012."
                    }
                }),
                &[],
            ),
            Self::CheckSavingsStatus
            | Self::StartFidyah
            | Self::StartSavingsDeposit => object(json!({}), &[]),
            Self::GetPaymentMethods => object(
                json!({ "method": { "type": "string", "enum": ["bank", "qris"] } }),
                &[],
            ),
            Self::RegisterDonor => object(
                json!({
                    "name": { "type": "string", "description": "Donor's full name." },
                    "email": { "type": "string" }
                }),
                &["name"],
            ),
            Self::StartZakat => object(
                json!({
                    "zakat_type": { "type": "string", "enum": zakat_types },
                    "amount": amount
                }),
                &[],
            ),
            Self::StartDonation => object(
                json!({
                    "program_id": { "type": "string", "description": "Campaign id." },
                    "amount": amount
                }),
                &["program_id"],
            ),
            Self::StartQurban | Self::StartQurbanSavings => object(
                json!({ "period_id": { "type": "string", "description": "Qurban period id." } }),
                &[],
            ),
            Self::Reply => object(
                json!({
                    "message": { "type": "string", "description": "Text sent to the donor." }
                }),
                &["message"],
            ),
        }
    }
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({ "type": "object", "properties": properties, "required": required })
}

/// `{name, description, parameters}` as handed to providers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

pub fn catalog() -> Vec<ToolSpec> {
    ToolName::ALL
        .iter()
        .map(|tool| ToolSpec {
            name: tool.as_str().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters(),
        })
        .collect()
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolArgumentError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid arguments for `{tool}`: {reason}")]
    Invalid { tool: &'static str, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Bank,
    Qris,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolCall {
    SearchPrograms { query: String },
    GetProgramDetail { program_id: ProductId },
    GetZakatMenu { kind: Option<ZakatKind> },
    CheckTransactionStatus { transaction_number: Option<String> },
    CheckSavingsStatus,
    GetPaymentMethods { method: Option<PaymentMethod> },
    RegisterDonor { name: String, email: Option<String> },
    ConfirmPayment { transaction_number: Option<String> },
    StartFlow(FlowStart),
    Reply { message: String },
}

#[derive(Deserialize)]
struct QueryArgs {
    #[serde(default)]
    query: String,
}

#[derive(Deserialize)]
struct ProgramArgs {
    program_id: String,
    #[serde(default)]
    amount: Option<AmountArg>,
}

#[derive(Deserialize)]
struct ZakatArgs {
    #[serde(default)]
    zakat_type: Option<String>,
    #[serde(default)]
    amount: Option<AmountArg>,
}

#[derive(Deserialize)]
struct TransactionArgs {
    #[serde(default)]
    transaction_number: Option<String>,
}

#[derive(Deserialize)]
struct PaymentArgs {
    #[serde(default)]
    method: Option<PaymentMethod>,
}

#[derive(Deserialize)]
struct RegisterArgs {
    name: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct PeriodArgs {
    #[serde(default)]
    period_id: Option<String>,
}

#[derive(Deserialize)]
struct ReplyArgs {
    message: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AmountArg {
    Number(f64),
    Text(String),
}

impl ToolCall {
    pub fn parse(invocation: &ToolInvocation) -> Result<Self, ToolArgumentError> {
        let tool = ToolName::parse(&invocation.name)
            .ok_or_else(|| ToolArgumentError::UnknownTool(invocation.name.clone()))?;
        let value = &invocation.arguments;

        let call = match tool {
            ToolName::SearchPrograms => {
                let args: QueryArgs = decode(tool, value)?;
                Self::SearchPrograms { query: args.query.trim().to_string() }
            }
            ToolName::GetProgramDetail => {
                let args: ProgramArgs = decode(tool, value)?;
                Self::GetProgramDetail { program_id: required_id(tool, &args.program_id)? }
            }
            ToolName::GetZakatMenu => {
                let args: ZakatArgs = decode(tool, value)?;
                Self::GetZakatMenu { kind: zakat_kind(tool, args.zakat_type)? }
            }
            ToolName::CheckTransactionStatus => {
                let args: TransactionArgs = decode(tool, value)?;
                Self::CheckTransactionStatus {
                    transaction_number: non_blank(args.transaction_number),
                }
            }
            ToolName::CheckSavingsStatus => Self::CheckSavingsStatus,
            ToolName::GetPaymentMethods => {
                let args: PaymentArgs = decode(tool, value)?;
                Self::GetPaymentMethods { method: args.method }
            }
            ToolName::RegisterDonor => {
                let args: RegisterArgs = decode(tool, value)?;
                let name = args.name.trim().to_string();
                if name.is_empty() {
                    return Err(invalid(tool, "name must not be empty"));
                }
                Self::RegisterDonor { name, email: non_blank(args.email) }
            }
            ToolName::ConfirmPayment => {
                let args: TransactionArgs = decode(tool, value)?;
                Self::ConfirmPayment { transaction_number: non_blank(args.transaction_number) }
            }
            ToolName::StartZakat => {
                let args: ZakatArgs = decode(tool, value)?;
                Self::StartFlow(FlowStart::Zakat {
                    kind: zakat_kind(tool, args.zakat_type)?,
                    amount: amount(tool, args.amount)?,
                })
            }
            ToolName::StartDonation => {
                let args: ProgramArgs = decode(tool, value)?;
                Self::StartFlow(FlowStart::Donation {
                    campaign_id: required_id(tool, &args.program_id)?,
                    amount: amount(tool, args.amount)?,
                })
            }
            ToolName::StartFidyah => Self::StartFlow(FlowStart::Fidyah),
            ToolName::StartQurban => {
                let args: PeriodArgs = decode(tool, value)?;
                Self::StartFlow(FlowStart::Qurban {
                    period_id: non_blank(args.period_id).map(PeriodId),
                })
            }
            ToolName::StartQurbanSavings => {
                let args: PeriodArgs = decode(tool, value)?;
                Self::StartFlow(FlowStart::QurbanSavings {
                    period_id: non_blank(args.period_id).map(PeriodId),
                })
            }
            ToolName::StartSavingsDeposit => Self::StartFlow(FlowStart::QurbanSavingsDeposit),
            ToolName::Reply => {
                let args: ReplyArgs = decode(tool, value)?;
                Self::Reply { message: args.message }
            }
        };
        Ok(call)
    }
}

fn decode<T: DeserializeOwned>(tool: ToolName, value: &Value) -> Result<T, ToolArgumentError> {
    let value = if value.is_null() { json!({}) } else { value.clone() };
    serde_json::from_value(value).map_err(|error| invalid(tool, &error.to_string()))
}

fn invalid(tool: ToolName, reason: &str) -> ToolArgumentError {
    ToolArgumentError::Invalid { tool: tool.as_str(), reason: reason.to_string() }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|text| text.trim().to_string()).filter(|text| !text.is_empty())
}

fn required_id(tool: ToolName, raw: &str) -> Result<ProductId, ToolArgumentError> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(invalid(tool, "program_id must not be empty"));
    }
    Ok(ProductId(id.to_string()))
}

fn zakat_kind(tool: ToolName, raw: Option<String>) -> Result<Option<ZakatKind>, ToolArgumentError> {
    non_blank(raw)
        .map(|text| text.parse::<ZakatKind>().map_err(|reason| invalid(tool, &reason)))
        .transpose()
}

fn amount(tool: ToolName, raw: Option<AmountArg>) -> Result<Option<i64>, ToolArgumentError> {
    match raw {
        None => Ok(None),
        Some(AmountArg::Number(value)) if value.is_finite() && value >= 1.0 => {
            Ok(Some(value.round() as i64))
        }
        Some(AmountArg::Number(_)) => Err(invalid(tool, "amount must be a positive number")),
        Some(AmountArg::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(AmountArg::Text(text)) => {
            parse_amount(&text).map(Some).map_err(|error| invalid(tool, &error.to_string()))
        }
    }
}

/// Text fed back to the model, plus an image to attach to the final reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub image: Option<OutboundImage>,
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        Self { text, image: None }
    }
}

/// Executes the read-only lookups against the commerce facades.
#[derive(Clone)]
pub struct Toolbox {
    commerce: Commerce,
}

impl Toolbox {
    pub fn new(commerce: Commerce) -> Self {
        Self { commerce }
    }

    pub fn commerce(&self) -> &Commerce {
        &self.commerce
    }

    pub async fn search_programs(&self, query: &str) -> String {
        let campaigns = match self.commerce.catalog.search_campaigns(query).await {
            Ok(campaigns) => campaigns,
            Err(error) => return facade_failure("search_programs", error),
        };
        if campaigns.is_empty() {
            return format!("Tidak ada program donasi yang cocok dengan \"{query}\".");
        }

        let lines: Vec<String> = campaigns
            .iter()
            .enumerate()
            .map(|(index, campaign)| {
                let progress = match campaign.target_amount {
                    Some(target) => format!(
                        "terkumpul {} dari target {}",
                        format_rupiah(campaign.collected_amount),
                        format_rupiah(target)
                    ),
                    None => format!("terkumpul {}", format_rupiah(campaign.collected_amount)),
                };
                format!("{}. {} (id: {}), {progress}", index + 1, campaign.title, campaign.id)
            })
            .collect();
        format!("Program donasi yang tersedia:\n{}", lines.join("\n"))
    }

    pub async fn program_detail(&self, id: &ProductId) -> String {
        let campaign = match self.commerce.catalog.find_campaign(id).await {
            Ok(Some(campaign)) => campaign,
            Ok(None) => return format!("Program dengan id `{id}` tidak ditemukan."),
            Err(error) => return facade_failure("get_program_detail", error),
        };

        let mut lines = vec![
            format!("*{}* (id: {})", campaign.title, campaign.id),
            campaign.description.clone(),
            format!("Terkumpul: {}", format_rupiah(campaign.collected_amount)),
        ];
        if let Some(target) = campaign.target_amount {
            lines.push(format!("Target: {}", format_rupiah(target)));
        }
        if let Some(end_date) = campaign.end_date {
            lines.push(format!("Berakhir: {}", end_date.format("%d-%m-%Y")));
        }
        lines.join("\n")
    }

    pub async fn zakat_menu(&self, kind: Option<ZakatKind>) -> String {
        let types = match self.commerce.catalog.zakat_types().await {
            Ok(types) => types,
            Err(error) => return facade_failure("get_zakat_menu", error),
        };

        let mut sections = Vec::new();
        let wanted = types.iter().filter(|zakat_type| kind.map_or(true, |k| k == zakat_type.kind));
        for zakat_type in wanted {
            let mut lines = vec![format!(
                "*{}* (zakat_type: {}), tarif {}%",
                zakat_type.name,
                zakat_type.kind.as_str(),
                zakat_type.rate_percent.normalize().to_string().replace('.', ",")
            )];
            if let Some(per_head) = zakat_type.per_head_amount {
                lines.push(format!("  {} per jiwa", format_rupiah(per_head)));
            }
            match self.commerce.catalog.zakat_programs(&zakat_type.id).await {
                Ok(programs) => {
                    lines.extend(programs.iter().map(|program| format!("  - {}", program.name)))
                }
                Err(error) => return facade_failure("get_zakat_menu", error),
            }
            sections.push(lines.join("\n"));
        }

        if sections.is_empty() {
            return "Belum ada program zakat yang tersedia.".to_string();
        }
        format!("Jenis zakat yang dapat dibayarkan:\n\n{}", sections.join("\n\n"))
    }

    /// Only transactions created from `phone` are ever revealed.
    pub async fn transaction_status(&self, phone: &str, number: Option<&str>) -> String {
        let transactions = &self.commerce.transactions;
        match number {
            Some(number) => match transactions.find_by_number(number).await {
                Ok(Some(transaction)) if transaction.donor_phone == phone => format!(
                    "Transaksi {}\nProgram: {}\nTotal: {}\nStatus: {}",
                    transaction.transaction_number,
                    transaction.product_name,
                    format_rupiah(transaction.total_amount),
                    transaction.status.label()
                ),
                Ok(_) => format!("Transaksi {number} tidak ditemukan untuk nomor Anda."),
                Err(error) => facade_failure("check_transaction_status", error),
            },
            None => match transactions.list_for_phone(phone, RECENT_TRANSACTIONS).await {
                Ok(list) if list.is_empty() => "Belum ada transaksi dari nomor ini.".to_string(),
                Ok(list) => {
                    let lines: Vec<String> = list
                        .iter()
                        .map(|transaction| {
                            format!(
                                "- {}: {}, {}, {}",
                                transaction.transaction_number,
                                transaction.product_name,
                                format_rupiah(transaction.total_amount),
                                transaction.status.label()
                            )
                        })
                        .collect();
                    format!("Transaksi terakhir Anda:\n{}", lines.join("\n"))
                }
                Err(error) => facade_failure("check_transaction_status", error),
            },
        }
    }

    pub async fn savings_status(&self, donor: Option<&DonorId>) -> String {
        let Some(donor) = donor else {
            return REGISTER_FIRST.to_string();
        };
        let plans = match self.commerce.savings.active_plans(donor).await {
            Ok(plans) => plans,
            Err(error) => return facade_failure("check_savings_status", error),
        };
        if plans.is_empty() {
            return "Anda belum memiliki tabungan qurban yang aktif.".to_string();
        }

        let lines: Vec<String> = plans
            .iter()
            .map(|plan| {
                format!(
                    "- {} ({}): terkumpul {} dari {}, sisa {}, cicilan {} {}",
                    plan.savings_number,
                    plan.package_name,
                    format_rupiah(plan.collected_amount),
                    format_rupiah(plan.target_amount),
                    format_rupiah(plan.remaining()),
                    format_rupiah(plan.installment_amount),
                    plan.frequency.label()
                )
            })
            .collect();
        format!("Tabungan qurban Anda:\n{}", lines.join("\n"))
    }

    pub async fn payment_methods(&self, method: Option<PaymentMethod>) -> ToolOutput {
        let payments = &self.commerce.payments;
        let mut sections = Vec::new();
        let mut image = None;

        if method != Some(PaymentMethod::Qris) {
            match payments.bank_accounts().await {
                Ok(accounts) if !accounts.is_empty() => {
                    let lines: Vec<String> = accounts
                        .iter()
                        .map(|account| {
                            format!(
                                "- {} {} a.n. {}",
                                account.bank_name, account.account_number, account.account_holder
                            )
                        })
                        .collect();
                    sections.push(format!("Transfer bank:\n{}", lines.join("\n")));
                }
                Ok(_) => {}
                Err(error) => return facade_failure("get_payment_methods", error).into(),
            }
        }
        if method != Some(PaymentMethod::Bank) {
            match payments.qris().await {
                Ok(Some(qris)) => {
                    sections.push(format!(
                        "QRIS a.n. {} (gambar QRIS terlampir pada pesan ini).",
                        qris.merchant_name
                    ));
                    image = Some(OutboundImage {
                        url: Some(qris.image_url),
                        data_base64: None,
                        mime_type: "image/png".to_string(),
                        filename: "qris.png".to_string(),
                    });
                }
                Ok(None) => {}
                Err(error) => return facade_failure("get_payment_methods", error).into(),
            }
        }

        if sections.is_empty() {
            return ToolOutput::from("Metode pembayaran belum tersedia.".to_string());
        }
        sections.push(PROOF_HINT.to_string());
        ToolOutput { text: sections.join("\n\n"), image }
    }
}

/// Logs the collaborator failure and returns the donor-safe message.
pub(crate) fn facade_failure(tool: &'static str, error: FacadeError) -> String {
    tracing::warn!(event_name = "tool.facade_failed", tool, error = %error, "lookup failed");
    ApplicationError::from(error).user_message().to_string()
}
