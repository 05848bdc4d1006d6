use std::sync::Arc;

use serde_json::{json, Value};

use amanah_agent::guardrails::{ATTACH_PROOF, PROOF_REQUEST};
use amanah_agent::llm::TranscriptItem;
use amanah_agent::{
    AgentRuntime, ConversationService, EventOutcome, GuardrailPolicy, ProviderError,
    ScriptedProvider, APOLOGY,
};
use amanah_channel::{IgnoreReason, RecordingGateway, SentMessage, WebhookEvent};
use amanah_core::commerce::TransactionFacade;
use amanah_core::config::AppConfig;
use amanah_core::dedup::DedupGuard;
use amanah_core::domain::transaction::TransactionStatus;
use amanah_core::flows::{FlowEngine, FlowKind, FlowSettings, REGISTER_FIRST};
use amanah_core::nisab::NisabCalculator;
use amanah_core::session::SessionStore;
use amanah_db::InMemoryCommerce;

const DONOR_PHONE: &str = "6281200000001";
const GUEST_PHONE: &str = "6281299999999";

struct Harness {
    service: ConversationService,
    provider: Arc<ScriptedProvider>,
    gateway: Arc<RecordingGateway>,
    store: InMemoryCommerce,
}

async fn harness_with_rounds(max_rounds: u32) -> Harness {
    let (store, _) = InMemoryCommerce::demo().await.expect("demo catalog loads");
    let nisab = NisabCalculator::from_config(&AppConfig::default().commerce, None);
    let engine = FlowEngine::new(store.commerce(), FlowSettings::default(), Arc::new(nisab));
    let provider = Arc::new(ScriptedProvider::new());
    let agent =
        AgentRuntime::new(provider.clone(), engine.clone(), GuardrailPolicy::default(), max_rounds)
            .expect("system prompt compiles");
    let gateway = Arc::new(RecordingGateway::default());
    let service = ConversationService::new(
        Arc::new(SessionStore::default()),
        Arc::new(DedupGuard::default()),
        engine,
        agent,
        gateway.clone(),
    );
    Harness { service, provider, gateway, store }
}

async fn harness() -> Harness {
    harness_with_rounds(5).await
}

fn event(value: Value) -> WebhookEvent {
    serde_json::from_value(value).expect("webhook body")
}

fn text_from(phone: &str, id: &str, body: &str) -> WebhookEvent {
    event(json!({
        "event": "message",
        "payload": { "id": id, "from": format!("{phone}@c.us"), "body": body }
    }))
}

fn image_from(phone: &str, id: &str, caption: &str) -> WebhookEvent {
    event(json!({
        "event": "message",
        "payload": {
            "id": id,
            "from": format!("{phone}@c.us"),
            "body": caption,
            "media": { "url": "https://media.example.org/bukti.jpg", "mimetype": "image/jpeg" }
        }
    }))
}

async fn last_text(harness: &Harness) -> String {
    harness.gateway.sent().await.last().map(|sent| sent.text().to_string()).unwrap_or_default()
}

async fn active_flow(harness: &Harness, phone: &str) -> Option<FlowKind> {
    let lease = harness.service.sessions().acquire(phone);
    let session = lease.session.lock().await;
    session.flow.as_ref().map(|flow| flow.kind())
}

#[tokio::test]
async fn registered_donor_completes_a_donation() {
    let harness = harness().await;
    harness
        .provider
        .push_tool("start_donation", json!({ "program_id": "masjid-al-ikhlas", "amount": 150000 }))
        .await;

    let outcome =
        harness.service.handle_event(text_from(DONOR_PHONE, "m-1", "donasi masjid 150rb")).await;
    assert_eq!(outcome, EventOutcome::Replied { delivered: true });
    let prompt = last_text(&harness).await;
    assert!(prompt.contains("Konfirmasi Donasi"), "{prompt}");
    assert!(prompt.contains("Rp150.000"), "{prompt}");
    assert_eq!(active_flow(&harness, DONOR_PHONE).await, Some(FlowKind::Donation));

    harness.service.handle_event(text_from(DONOR_PHONE, "m-2", "ya")).await;
    let summary = last_text(&harness).await;
    assert!(summary.contains("No. transaksi: *AMN-"), "{summary}");
    assert_eq!(harness.store.transactions.len().await, 1);
    assert_eq!(active_flow(&harness, DONOR_PHONE).await, None);
    assert_eq!(harness.provider.requests().await.len(), 1);
}

#[tokio::test]
async fn unregistered_donor_is_asked_to_register_before_a_flow() {
    let harness = harness().await;
    harness.provider.push_tool("start_zakat", json!({ "zakat_type": "fitrah" })).await;
    harness.provider.push_reply("Boleh kami tahu nama lengkap Anda untuk pendaftaran?").await;

    harness.service.handle_event(text_from(GUEST_PHONE, "g-1", "mau bayar zakat fitrah")).await;

    assert_eq!(last_text(&harness).await, "Boleh kami tahu nama lengkap Anda untuk pendaftaran?");
    assert_eq!(active_flow(&harness, GUEST_PHONE).await, None);
    let requests = harness.provider.requests().await;
    let fed_back = requests[1].transcript.iter().any(|item| {
        matches!(item, TranscriptItem::ToolResult { content, .. } if content == REGISTER_FIRST)
    });
    assert!(fed_back, "registration notice should reach the model");
}

#[tokio::test]
async fn registration_unlocks_flows_in_the_same_turn() {
    let harness = harness().await;
    harness.provider.push_tool("register_donor", json!({ "name": "Aisyah" })).await;
    harness.provider.push_tool("start_zakat", json!({ "zakat_type": "fitrah" })).await;

    harness.service.handle_event(text_from(GUEST_PHONE, "g-1", "nama saya Aisyah")).await;

    assert_eq!(harness.store.donors.len().await, 2);
    assert_eq!(active_flow(&harness, GUEST_PHONE).await, Some(FlowKind::Zakat));
    let lease = harness.service.sessions().acquire(GUEST_PHONE);
    let session = lease.session.lock().await;
    assert!(session.is_registered());
    assert_eq!(session.donor_name.as_deref(), Some("Aisyah"));
}

#[tokio::test]
async fn chat_profile_name_reaches_the_system_prompt_until_registration() {
    let harness = harness().await;
    harness.provider.push_reply("Boleh kami tahu nama lengkap Anda?").await;
    let named = event(json!({
        "event": "message",
        "payload": {
            "id": "g-1",
            "from": format!("{GUEST_PHONE}@c.us"),
            "from_name": "Aisyah WA",
            "body": "assalamualaikum"
        }
    }));

    harness.service.handle_event(named).await;

    let requests = harness.provider.requests().await;
    assert!(requests[0].system.contains("nama profil WhatsApp \"Aisyah WA\""));
    let lease = harness.service.sessions().acquire(GUEST_PHONE);
    let session = lease.session.lock().await;
    assert!(!session.is_registered());
    assert_eq!(session.display_name(), Some("Aisyah WA"));
}

#[tokio::test]
async fn payment_claims_from_the_model_are_replaced() {
    let harness = harness().await;
    let claims = [
        "Alhamdulillah, pembayaran diterima. Terima kasih!",
        "Pembayaran Anda sudah diterima, terima kasih!",
        "Alhamdulillah, donasi Anda telah kami terima.",
        "Pembayaran Anda berhasil dan sudah terverifikasi.",
        "Zakat Anda telah kami terima, jazakallah.",
    ];

    for (index, claim) in claims.into_iter().enumerate() {
        harness.provider.push_reply(claim).await;
        let id = format!("m-{index}");
        harness.service.handle_event(text_from(DONOR_PHONE, &id, "sudah transfer ya")).await;

        assert_eq!(last_text(&harness).await, PROOF_REQUEST, "`{claim}` reached the donor");
    }
    assert_eq!(harness.gateway.sent().await.len(), claims.len());
}

#[tokio::test]
async fn confirmation_without_proof_image_is_refused() {
    let harness = harness().await;
    harness.provider.push_tool("confirm_payment", json!({})).await;
    harness.provider.push_reply("Silakan kirim foto bukti transfernya.").await;

    harness.service.handle_event(text_from(DONOR_PHONE, "m-1", "sudah saya bayar")).await;

    let requests = harness.provider.requests().await;
    assert_eq!(requests.len(), 2);
    assert!(matches!(
        requests[1].transcript.last(),
        Some(TranscriptItem::ToolResult { content, .. }) if content == ATTACH_PROOF
    ));
    assert_eq!(last_text(&harness).await, "Silakan kirim foto bukti transfernya.");
}

#[tokio::test]
async fn proof_image_moves_the_pending_transaction_to_verification() {
    let harness = harness().await;
    harness
        .provider
        .push_tool("start_donation", json!({ "program_id": "masjid-al-ikhlas", "amount": "100rb" }))
        .await;
    harness.service.handle_event(text_from(DONOR_PHONE, "m-1", "donasi masjid 100rb")).await;
    harness.service.handle_event(text_from(DONOR_PHONE, "m-2", "ya")).await;

    harness.provider.push_tool("confirm_payment", json!({})).await;
    harness.service.handle_event(image_from(DONOR_PHONE, "m-3", "ini buktinya")).await;

    let receipt = last_text(&harness).await;
    assert!(receipt.contains("akan segera diverifikasi"), "{receipt}");
    let recent = harness.store.commerce().transactions.list_for_phone(DONOR_PHONE, 5).await;
    let recent = recent.expect("transactions listed");
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].status, TransactionStatus::AwaitingVerification);
}

#[tokio::test]
async fn image_during_a_flow_clears_it_with_a_notice() {
    let harness = harness().await;
    harness
        .provider
        .push_tool("start_donation", json!({ "program_id": "masjid-al-ikhlas", "amount": 150000 }))
        .await;
    harness.service.handle_event(text_from(DONOR_PHONE, "m-1", "donasi masjid")).await;
    assert_eq!(active_flow(&harness, DONOR_PHONE).await, Some(FlowKind::Donation));

    harness.provider.push_reply("Gambar sudah kami terima. Ada yang bisa dibantu?").await;
    harness.service.handle_event(image_from(DONOR_PHONE, "m-2", "")).await;

    let reply = last_text(&harness).await;
    assert!(reply.starts_with("Proses donasi sebelumnya kami hentikan"), "{reply}");
    assert!(reply.ends_with("Gambar sudah kami terima. Ada yang bisa dibantu?"), "{reply}");
    assert_eq!(active_flow(&harness, DONOR_PHONE).await, None);
    assert_eq!(harness.store.transactions.len().await, 0);
}

#[tokio::test]
async fn cancelling_a_flow_creates_nothing() {
    let harness = harness().await;
    harness
        .provider
        .push_tool("start_donation", json!({ "program_id": "air-bersih-ntt" }))
        .await;
    harness.service.handle_event(text_from(DONOR_PHONE, "m-1", "donasi air bersih")).await;
    harness.service.handle_event(text_from(DONOR_PHONE, "m-2", "batal")).await;

    assert!(last_text(&harness).await.contains("dibatalkan"));
    assert_eq!(active_flow(&harness, DONOR_PHONE).await, None);
    assert_eq!(harness.store.transactions.len().await, 0);
    assert_eq!(harness.provider.requests().await.len(), 1);
}

#[tokio::test]
async fn redelivered_messages_get_one_reply() {
    let harness = harness().await;
    harness.provider.push_reply("Wa'alaikumussalam, ada yang bisa kami bantu?").await;

    let first =
        harness.service.handle_event(text_from(DONOR_PHONE, "dup-1", "assalamualaikum")).await;
    let second =
        harness.service.handle_event(text_from(DONOR_PHONE, "dup-1", "assalamualaikum")).await;

    assert_eq!(first, EventOutcome::Replied { delivered: true });
    assert_eq!(second, EventOutcome::Duplicate);
    assert_eq!(harness.gateway.sent().await.len(), 1);
}

#[tokio::test]
async fn group_and_own_messages_are_not_answered() {
    let harness = harness().await;
    let group = event(json!({
        "event": "message",
        "payload": { "id": "g-1", "from": "1203630@g.us", "body": "halo semua" }
    }));
    let own = event(json!({
        "event": "message",
        "payload": { "id": "o-1", "from": "6281200000001@c.us", "body": "tes", "fromMe": true }
    }));

    assert_eq!(
        harness.service.handle_event(group).await,
        EventOutcome::Ignored(IgnoreReason::GroupChat)
    );
    assert_eq!(
        harness.service.handle_event(own).await,
        EventOutcome::Ignored(IgnoreReason::FromSelf)
    );
    assert!(harness.gateway.sent().await.is_empty());
    assert!(harness.service.sessions().is_empty());
}

#[tokio::test]
async fn provider_failure_sends_the_apology() {
    let harness = harness().await;
    harness.provider.push_error(ProviderError::Timeout).await;

    harness.service.handle_event(text_from(DONOR_PHONE, "m-1", "info program")).await;

    assert_eq!(last_text(&harness).await, APOLOGY);
}

#[tokio::test]
async fn exhausted_rounds_fall_back_to_the_last_tool_result() {
    let harness = harness_with_rounds(2).await;
    harness.provider.push_tool("search_programs", json!({ "query": "masjid" })).await;
    harness.provider.push_tool("search_programs", json!({ "query": "masjid" })).await;
    harness.provider.push_reply("tidak akan terpakai").await;

    harness.service.handle_event(text_from(DONOR_PHONE, "m-1", "program masjid")).await;

    let reply = last_text(&harness).await;
    assert!(reply.contains("Pembangunan Masjid Al-Ikhlas"), "{reply}");
    assert_eq!(harness.provider.remaining().await, 1);
}

#[tokio::test]
async fn qris_request_sends_the_code_with_the_reply_as_caption() {
    let harness = harness().await;
    harness.provider.push_tool("get_payment_methods", json!({ "method": "qris" })).await;
    harness.provider.push_reply("Silakan scan QRIS berikut.").await;

    harness.service.handle_event(text_from(DONOR_PHONE, "m-1", "bayar pakai qris")).await;

    let sent = harness.gateway.sent().await;
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        SentMessage::Image { phone, image, caption } => {
            assert_eq!(phone, DONOR_PHONE);
            assert_eq!(image.url.as_deref(), Some("https://cdn.example.org/amanah/qris.png"));
            assert_eq!(caption, "Silakan scan QRIS berikut.");
        }
        other => panic!("expected an image message, got {other:?}"),
    }
}

#[tokio::test]
async fn messages_from_one_phone_are_handled_in_order() {
    let harness = harness().await;
    harness
        .provider
        .push_tool("start_donation", json!({ "program_id": "masjid-al-ikhlas", "amount": 150000 }))
        .await;

    let first = harness.service.handle_event(text_from(DONOR_PHONE, "m-1", "donasi masjid"));
    let second = harness.service.handle_event(text_from(DONOR_PHONE, "m-2", "ya"));
    tokio::join!(first, second);

    assert_eq!(harness.store.transactions.len().await, 1);
    assert_eq!(harness.provider.requests().await.len(), 1);
    assert_eq!(harness.gateway.texts_to(DONOR_PHONE).await.len(), 2);
}

#[tokio::test]
async fn malformed_tool_arguments_are_reported_back_to_the_model() {
    let harness = harness().await;
    harness.provider.push_tool("get_program_detail", json!({ "id": 42 })).await;
    harness.provider.push_reply("Program mana yang ingin Anda ketahui?").await;

    harness.service.handle_event(text_from(DONOR_PHONE, "m-1", "detail programnya?")).await;

    let requests = harness.provider.requests().await;
    assert!(matches!(
        requests[1].transcript.last(),
        Some(TranscriptItem::ToolResult { content, .. }) if content.starts_with("Error:")
    ));
    assert_eq!(last_text(&harness).await, "Program mana yang ingin Anda ketahui?");
}
