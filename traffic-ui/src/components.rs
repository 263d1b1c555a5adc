use std::rc::Rc;

use chrono::{DateTime, Utc};
use dioxus::prelude::*;
use shared_types::{
    ChatMessage, ChatRole, Congestion, CongestionLevel, LaneId, LaneState, SignalLight,
    MAX_DENSITY,
};

use crate::api::HttpBackend;
use crate::config::SyncConfig;
use crate::interop::{scroll_chat_to_end, BrowserClock, CHAT_END_ID};
use crate::sync::{Coordinator, SyncChange, TracingSink};

type BrowserCoordinator = Coordinator<HttpBackend, BrowserClock>;

#[component]
pub fn TrafficDashboard() -> Element {
    let revision = use_signal(|| 0u64);
    let chat_revision = use_signal(|| 0u64);

    let coordinator = use_hook(|| {
        let config = SyncConfig::default();
        let backend = Rc::new(HttpBackend::new(&config));
        Rc::new(BrowserCoordinator::new(
            config,
            backend,
            Rc::new(BrowserClock),
            Rc::new(TracingSink),
            move |change| {
                let mut revision = revision;
                let mut chat_revision = chat_revision;
                if change == SyncChange::Chat {
                    *chat_revision.write() += 1;
                }
                *revision.write() += 1;
            },
        ))
    });

    {
        let coordinator = coordinator.clone();
        use_effect(move || {
            spawn(coordinator.run());
        });
    }

    {
        let coordinator = coordinator.clone();
        use_drop(move || {
            coordinator.shutdown();
        });
    }

    // Keep the newest chat message in view
    use_effect(move || {
        if chat_revision() > 0 {
            scroll_chat_to_end();
        }
    });

    let select_lane = use_callback({
        let coordinator = coordinator.clone();
        move |lane: LaneId| coordinator.select_lane(lane)
    });

    let clear_selection = use_callback({
        let coordinator = coordinator.clone();
        move |_: ()| coordinator.clear_selection()
    });

    let trigger_emergency = use_callback({
        let coordinator = coordinator.clone();
        move |lane: LaneId| {
            let request = coordinator.trigger_emergency(lane);
            // Failures are already reported and followed by a refresh.
            spawn(async move {
                let _ = request.await;
            });
        }
    });

    let edit_chat = use_callback({
        let coordinator = coordinator.clone();
        move |text: String| coordinator.set_chat_input(text)
    });

    let send_chat = use_callback({
        let coordinator = coordinator.clone();
        move |_: ()| {
            if let Some(request) = coordinator.submit_chat() {
                spawn(request);
            }
        }
    });

    let _ = revision();
    let display = coordinator.display();
    let Some(status) = display.snapshot.clone() else {
        return rsx! {
            style { {DASHBOARD_STYLES} }
            div { class: "loading", "Loading Smart Traffic AI..." }
        };
    };

    let countdown = coordinator.countdown();
    let active_light = status.active_light();
    let selected = display
        .selected_lane()
        .map(|(id, lane)| (id.clone(), *lane));
    let chat = coordinator.chat();
    let api_base = coordinator.config().api_base.clone();
    let refresh_label = coordinator.config().refresh_label();

    rsx! {
        style { {DASHBOARD_STYLES} }

        div {
            class: "traffic-app",

            header {
                class: "traffic-header",
                h1 { "🚦 Smart Traffic AI Control" }
                div {
                    class: if status.emergency_active { "mode-badge emergency" } else { "mode-badge" },
                    "{mode_label(status.emergency_active)}"
                }
            }

            div {
                class: "main-display",
                h2 { "{status.active_lane} - {active_light}" }
                div { class: "countdown", "{countdown}s" }
            }

            div {
                class: "lanes",
                for (id, lane) in status.lanes.iter() {
                    LaneCard {
                        key: "{id}",
                        id: id.clone(),
                        lane: *lane,
                        selected: display.selection.as_ref() == Some(id),
                        onselect: select_lane,
                    }
                }
            }

            {selected.map(|(id, lane)| rsx! {
                SelectedLanePanel { id, lane, onclose: clear_selection }
            })}

            div {
                class: "prediction",
                h3 { "🎯 Congestion Prediction" }
                div {
                    class: "badge {congestion_class(status.congestion.level)}",
                    "{congestion_label(&status.congestion)}"
                }
            }

            EmergencyControls { ontrigger: trigger_emergency }

            ChatPanel {
                transcript: chat.transcript().to_vec(),
                input: chat.input().to_string(),
                typing: chat.is_typing(),
                can_send: chat.can_submit(),
                onedit: edit_chat,
                onsend: send_chat,
            }

            footer {
                class: "traffic-footer",
                p { "🟢 Live | API: {api_base} | AI: Google Gemini | Refresh: {refresh_label}" }
            }
        }
    }
}

#[component]
fn LaneCard(
    id: LaneId,
    lane: LaneState,
    selected: bool,
    onselect: EventHandler<LaneId>,
) -> Element {
    let color = light_color(lane.light);
    let density = lane.density_level();
    let clicked = id.clone();

    rsx! {
        div {
            class: if selected { "lane-card selected" } else { "lane-card" },
            style: "border-left: 8px solid {color};",
            onclick: move |_| onselect.call(clicked.clone()),
            h3 { "{id}" }
            p { "{lane.count} cars | Density: {density}/{MAX_DENSITY}" }
            div {
                class: "density-bar",
                div {
                    class: "density-fill",
                    style: "width: {density_percent(&lane)}%; background: {color};",
                }
            }
            p { class: "lane-light", style: "color: {color};", "{lane.light}" }
        }
    }
}

#[component]
fn SelectedLanePanel(id: LaneId, lane: LaneState, onclose: EventHandler<()>) -> Element {
    let color = light_color(lane.light);

    rsx! {
        div {
            class: "selected-lane-info",
            div {
                class: "selected-lane-header",
                h3 { "Selected Lane: {id}" }
                button {
                    class: "close-button",
                    title: "Clear selection",
                    onclick: move |_| onclose.call(()),
                    "✕"
                }
            }
            p {
                "Status: "
                span { style: "color: {color};", "{lane.light}" }
            }
            p { "Cars: {lane.count} | Density: {lane.density_level()}/{MAX_DENSITY}" }
        }
    }
}

#[component]
fn EmergencyControls(ontrigger: EventHandler<LaneId>) -> Element {
    rsx! {
        div {
            class: "emergency",
            h3 { "🚑 Emergency Test" }
            div {
                class: "emergency-buttons",
                for lane in LaneId::emergency_targets() {
                    button {
                        key: "{lane}",
                        class: "emergency-btn",
                        onclick: {
                            let lane = lane.clone();
                            move |_| ontrigger.call(lane.clone())
                        },
                        "🚨 {lane} Priority"
                    }
                }
            }
        }
    }
}

#[component]
fn ChatPanel(
    transcript: Vec<ChatMessage>,
    input: String,
    typing: bool,
    can_send: bool,
    onedit: EventHandler<String>,
    onsend: EventHandler<()>,
) -> Element {
    rsx! {
        div {
            class: "ai-chat",
            h3 { "🤖 Google Gemini AI Assistant" }

            div {
                class: "chat-container",
                if transcript.is_empty() && !typing {
                    div {
                        class: "chat-empty",
                        "Ask about congestion, signal timing, or emergency handling."
                    }
                }
                for message in transcript.iter() {
                    ChatBubble { key: "{message.id}", message: message.clone() }
                }
                if typing {
                    div {
                        class: "chat-message assistant typing",
                        "Gemini AI is typing"
                        span { class: "typing-dots", span {} span {} span {} }
                    }
                }
                div { id: CHAT_END_ID }
            }

            div {
                class: "chat-input",
                input {
                    value: "{input}",
                    placeholder: "Ask: 'Why North congested?' or 'Optimize signals?'",
                    disabled: typing,
                    oninput: move |e: FormEvent| onedit.call(e.value()),
                    onkeydown: move |e: KeyboardEvent| {
                        if e.key() == Key::Enter {
                            e.prevent_default();
                            onsend.call(());
                        }
                    },
                }
                button {
                    class: "send-button",
                    disabled: !can_send,
                    onclick: move |_| onsend.call(()),
                    "Send"
                }
            }
        }
    }
}

#[component]
fn ChatBubble(message: ChatMessage) -> Element {
    let (class, speaker) = match message.role {
        ChatRole::User => ("chat-message user", "You"),
        ChatRole::Assistant => ("chat-message assistant", "Gemini AI"),
    };

    rsx! {
        div {
            class,
            div {
                class: "chat-meta",
                strong { "{speaker}" }
                span { class: "chat-time", "{format_timestamp(message.timestamp)}" }
            }
            div { class: "chat-text", "{message.content}" }
        }
    }
}

fn light_color(light: SignalLight) -> &'static str {
    match light {
        SignalLight::Green => "#4CAF50",
        SignalLight::Yellow => "#FF9800",
        SignalLight::Red => "#F44336",
    }
}

fn mode_label(emergency_active: bool) -> &'static str {
    if emergency_active {
        "🚨 EMERGENCY MODE"
    } else {
        "🟢 Normal Mode"
    }
}

fn congestion_class(level: CongestionLevel) -> &'static str {
    match level {
        CongestionLevel::Low => "low",
        CongestionLevel::Medium => "medium",
        CongestionLevel::High => "high",
    }
}

fn congestion_label(congestion: &Congestion) -> String {
    format!("{} ({}%)", congestion.level, congestion.confidence_percent())
}

fn density_percent(lane: &LaneState) -> u32 {
    u32::from(lane.density_level()) * 100 / u32::from(MAX_DENSITY)
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%H:%M").to_string()
}

const DASHBOARD_STYLES: &str = r#"
.loading {
    display: flex;
    align-items: center;
    justify-content: center;
    min-height: 100vh;
    font-size: 1.5rem;
    color: var(--text-secondary, #94a3b8);
    background: var(--app-bg, #0f172a);
}

.traffic-app {
    max-width: 1100px;
    margin: 0 auto;
    padding: 1.5rem;
    min-height: 100vh;
    background: var(--app-bg, #0f172a);
    color: var(--text-primary, #f8fafc);
    font-family: system-ui, -apple-system, sans-serif;
}

/* Header */
.traffic-header {
    display: flex;
    align-items: center;
    justify-content: space-between;
    gap: 1rem;
    margin-bottom: 1.5rem;
}

.traffic-header h1 {
    margin: 0;
    font-size: 1.75rem;
}

.mode-badge {
    padding: 0.5rem 1rem;
    border-radius: 9999px;
    font-weight: 600;
    background: rgba(16, 185, 129, 0.15);
    color: #10b981;
    border: 1px solid #10b981;
}

.mode-badge.emergency {
    background: rgba(239, 68, 68, 0.15);
    color: #ef4444;
    border-color: #ef4444;
    animation: pulse 1s infinite;
}

@keyframes pulse {
    0%, 100% { opacity: 1; }
    50% { opacity: 0.6; }
}

/* Main display */
.main-display {
    text-align: center;
    padding: 1.5rem;
    margin-bottom: 1.5rem;
    background: var(--panel-bg, #1e293b);
    border: 1px solid var(--border-color, #334155);
    border-radius: 1rem;
}

.main-display h2 {
    margin: 0 0 0.5rem 0;
    font-size: 2rem;
}

.countdown {
    font-size: 4rem;
    font-weight: 700;
    font-variant-numeric: tabular-nums;
    color: var(--accent, #38bdf8);
}

/* Lanes */
.lanes {
    display: grid;
    grid-template-columns: repeat(auto-fit, minmax(200px, 1fr));
    gap: 1rem;
    margin-bottom: 1.5rem;
}

.lane-card {
    padding: 1rem;
    background: var(--panel-bg, #1e293b);
    border-radius: 0.75rem;
    cursor: pointer;
    transition: transform 0.15s, box-shadow 0.15s;
}

.lane-card:hover {
    transform: translateY(-2px);
}

.lane-card.selected {
    box-shadow: 0 0 0 2px #3498db;
}

.lane-card h3 {
    margin: 0 0 0.5rem 0;
}

.lane-card p {
    margin: 0.25rem 0;
    color: var(--text-secondary, #94a3b8);
}

.lane-light {
    font-weight: 700;
}

.density-bar {
    height: 6px;
    margin: 0.5rem 0;
    background: var(--border-color, #334155);
    border-radius: 3px;
    overflow: hidden;
}

.density-fill {
    height: 100%;
    transition: width 0.3s;
}

/* Selected lane */
.selected-lane-info {
    padding: 1rem;
    margin-bottom: 1.5rem;
    background: #2c3e50;
    border: 2px solid #3498db;
    border-radius: 0.5rem;
}

.selected-lane-header {
    display: flex;
    align-items: center;
    justify-content: space-between;
}

.selected-lane-header h3 {
    margin: 0;
    color: #3498db;
}

.close-button {
    background: transparent;
    border: none;
    color: var(--text-secondary, #94a3b8);
    font-size: 1rem;
    cursor: pointer;
}

/* Congestion */
.prediction {
    margin-bottom: 1.5rem;
}

.badge {
    display: inline-block;
    padding: 0.5rem 1rem;
    border-radius: 0.5rem;
    font-weight: 700;
}

.badge.low { background: #10b981; color: #022c22; }
.badge.medium { background: #f59e0b; color: #451a03; }
.badge.high { background: #ef4444; color: white; }

/* Emergency */
.emergency {
    margin-bottom: 1.5rem;
}

.emergency-buttons {
    display: flex;
    flex-wrap: wrap;
    gap: 0.5rem;
}

.emergency-btn {
    padding: 0.75rem 1.25rem;
    background: #b91c1c;
    color: white;
    border: none;
    border-radius: 0.5rem;
    font-weight: 600;
    cursor: pointer;
    transition: background 0.2s;
}

.emergency-btn:hover {
    background: #dc2626;
}

/* AI chat */
.ai-chat {
    margin-bottom: 1.5rem;
}

.chat-container {
    height: 280px;
    overflow-y: auto;
    padding: 1rem;
    background: var(--panel-bg, #1e293b);
    border: 1px solid var(--border-color, #334155);
    border-radius: 0.75rem;
    display: flex;
    flex-direction: column;
    gap: 0.75rem;
}

.chat-empty {
    margin: auto;
    color: var(--text-muted, #64748b);
    font-size: 0.875rem;
}

.chat-message {
    max-width: 80%;
    padding: 0.625rem 0.875rem;
    border-radius: 0.75rem;
    line-height: 1.45;
    word-wrap: break-word;
    white-space: pre-wrap;
}

.chat-message.user {
    align-self: flex-end;
    background: #3b82f6;
    color: white;
}

.chat-message.assistant {
    align-self: flex-start;
    background: var(--bubble-bg, #0f172a);
    border: 1px solid var(--border-color, #334155);
}

.chat-meta {
    display: flex;
    gap: 0.5rem;
    align-items: baseline;
    font-size: 0.75rem;
    margin-bottom: 0.25rem;
}

.chat-time {
    opacity: 0.7;
}

.typing {
    font-style: italic;
    color: var(--text-secondary, #94a3b8);
}

.typing-dots span {
    display: inline-block;
    width: 0.3rem;
    height: 0.3rem;
    margin-left: 0.2rem;
    background: currentColor;
    border-radius: 50%;
    animation: typing-bounce 1.4s infinite ease-in-out both;
}

.typing-dots span:nth-child(1) { animation-delay: -0.32s; }
.typing-dots span:nth-child(2) { animation-delay: -0.16s; }

@keyframes typing-bounce {
    0%, 80%, 100% { transform: scale(0); }
    40% { transform: scale(1); }
}

.chat-input {
    display: flex;
    gap: 0.5rem;
    margin-top: 0.75rem;
}

.chat-input input {
    flex: 1;
    padding: 0.75rem 1rem;
    background: var(--input-bg, #0f172a);
    color: var(--text-primary, #f8fafc);
    border: 1px solid var(--border-color, #334155);
    border-radius: 9999px;
    font-size: 0.9375rem;
    outline: none;
}

.chat-input input:focus {
    border-color: #3b82f6;
}

.send-button {
    padding: 0 1.5rem;
    background: #3b82f6;
    color: white;
    border: none;
    border-radius: 9999px;
    font-weight: 600;
    cursor: pointer;
}

.send-button:disabled {
    background: var(--border-color, #334155);
    color: var(--text-muted, #64748b);
    cursor: not-allowed;
}

/* Footer */
.traffic-footer {
    text-align: center;
    font-size: 0.8125rem;
    color: var(--text-muted, #64748b);
}
"#;
