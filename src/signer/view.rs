//! Text and choices the confirmation panel renders for a given state.

use super::intent::Intent;
use super::{SignerState, SigningStatus};
use crate::transaction::{AnnotatedDescription, Transaction};
use crate::watchers::WalletState;

const RADIO_ITEM_TITLE_LENGTH: usize = 30;
const PROVIDER_FALLBACK: &str = "your Ethereum provider";

/// Wallet name used in instructions
pub fn provider_string(provider_id: &str) -> &'static str {
    match provider_id {
        "metamask" => "Metamask",
        "frame" => "Frame",
        _ => PROVIDER_FALLBACK,
    }
}

/// Strip the prefixes wallets and the orchestration library put on errors
pub fn clean_error_message(message: &str) -> &str {
    let message = message.strip_prefix("Returned error: ").unwrap_or(message);
    message.strip_prefix("Error: ").unwrap_or(message)
}

/// Whether the wallet can sign for this organization's network
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    ProviderMissing,
    AccountLocked,
    WrongNetwork { expected: String },
}

pub fn check_eligibility(provider_available: bool, wallet: &WalletState, network_type: &str) -> Eligibility {
    if !provider_available {
        Eligibility::ProviderMissing
    } else if wallet.account.is_none() {
        Eligibility::AccountLocked
    } else if wallet.wallet_network != network_type {
        Eligibility::WrongNetwork {
            expected: network_type.to_string(),
        }
    } else {
        Eligibility::Eligible
    }
}

/// One selectable forwarding path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathChoice {
    pub title: String,
    pub description: String,
}

/// Describe a path by its forwarding hops; the intended call is left out
pub fn path_choice(path: &[Transaction]) -> PathChoice {
    let hops = &path[..path.len().saturating_sub(1)];

    let title = hops
        .iter()
        .map(|hop| {
            if hop.name.chars().count() > RADIO_ITEM_TITLE_LENGTH {
                let short: String = hop.name.chars().take(RADIO_ITEM_TITLE_LENGTH).collect();
                format!("{}…", short)
            } else {
                hop.name.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" → ");

    let description = match hops {
        [single] => single.description.clone(),
        _ => hops
            .iter()
            .enumerate()
            .map(|(i, hop)| format!("{}. {}: {}", i + 1, hop.name, hop.description))
            .collect::<Vec<_>>()
            .join("\n"),
    };

    PathChoice { title, description }
}

fn intent_action(intent: &Intent) -> String {
    match &intent.annotated_description {
        Some(fragments) => fragments
            .iter()
            .map(|fragment| match fragment {
                AnnotatedDescription::Address(address) => address.as_str(),
                AnnotatedDescription::App(app) => app.name.as_str(),
                AnnotatedDescription::Role(role) => role.name.as_str(),
                AnnotatedDescription::Text(text) => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join(" "),
        None if intent.description.is_empty() => "an action".to_string(),
        None => intent.description.clone(),
    }
}

/// "This transaction will perform ... on App."
pub fn describe_intent(intent: &Intent, forwarded: bool) -> String {
    format!(
        "This transaction will {}perform {} on {}.",
        if forwarded { "eventually " } else { "" },
        intent_action(intent),
        intent.name
    )
}

fn action_subject(intent: Option<&Intent>) -> (String, String) {
    let description = intent
        .map(|i| i.description.as_str())
        .filter(|d| !d.is_empty());
    let target = intent
        .map(|i| i.name.as_str())
        .filter(|n| !n.is_empty())
        .map(|n| format!(" on {}", n))
        .unwrap_or_default();
    (description.map(str::to_string).unwrap_or_default(), target)
}

fn provider_error(intent: Option<&Intent>, needed: &str) -> String {
    let (description, target) = action_subject(intent);
    let action = if description.is_empty() {
        "this action".to_string()
    } else {
        format!("\"{}\"", description)
    };
    format!("{} in order to perform {}{}.", needed, action, target)
}

/// The choices offered when signing is possible
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPathsView {
    pub direct: bool,
    /// Empty for a direct path
    pub choices: Vec<PathChoice>,
    pub choices_description: &'static str,
    pub selected: usize,
    pub action: String,
    /// Set when a setup transaction must be signed first
    pub pretransaction_note: Option<String>,
    pub signing_enabled: bool,
}

/// What the confirmation step shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmView {
    ProviderMissing { message: String, action: String },
    AccountLocked { message: String, action: String, can_request_enable: bool },
    WrongNetwork { expected: String, message: String, action: String },
    ActionPaths(ActionPathsView),
    Impossible { error: bool, message: String },
}

impl ConfirmView {
    pub fn can_sign(&self) -> bool {
        matches!(self, ConfirmView::ActionPaths(view) if view.signing_enabled)
    }
}

/// Build the confirmation step for `state` under `eligibility`
pub fn confirm_view(state: &SignerState, eligibility: Eligibility, provider_id: &str) -> ConfirmView {
    let intent = state.intent.as_ref();
    let provider = provider_string(provider_id);

    match eligibility {
        Eligibility::ProviderMissing => {
            return ConfirmView::ProviderMissing {
                message: provider_error(intent, "You need to have an Ethereum provider installed and enabled"),
                action: "Please install and enable Metamask.".to_string(),
            }
        }
        Eligibility::AccountLocked => {
            return ConfirmView::AccountLocked {
                message: provider_error(intent, &format!("You need to unlock and enable {}", provider)),
                action: format!("Please unlock and enable {}.", provider),
                can_request_enable: true,
            }
        }
        Eligibility::WrongNetwork { expected } => {
            return ConfirmView::WrongNetwork {
                message: provider_error(intent, &format!("You need to be connected to the {} network", expected)),
                action: format!("Please connect {} to the {} network.", provider, expected),
                expected,
            }
        }
        Eligibility::Eligible => {}
    }

    let possible = (state.direct || !state.action_paths.is_empty()) && state.sign_error.is_none();
    match intent {
        Some(intent) if possible => {
            let forwarded = !state.direct;
            ConfirmView::ActionPaths(ActionPathsView {
                direct: state.direct,
                choices: if forwarded {
                    state.action_paths.iter().map(|p| path_choice(p)).collect()
                } else {
                    Vec::new()
                },
                choices_description: if state.action_paths.len() > 1 {
                    "Here are some options you can use to perform it:"
                } else {
                    "You can perform this action through:"
                },
                selected: state.selected,
                action: describe_intent(intent, forwarded),
                pretransaction_note: state.pretransaction.as_ref().map(|_| {
                    format!(
                        "This action requires two transactions to be signed in {}, please confirm them one after another.",
                        provider
                    )
                }),
                signing_enabled: state.status == SigningStatus::Confirming,
            })
        }
        _ => {
            let (description, target) = action_subject(intent);
            let quoted = if description.is_empty() {
                String::new()
            } else {
                format!(" “{}”", description)
            };
            let error = state.sign_error.is_some();
            ConfirmView::Impossible {
                error,
                message: format!(
                    "The action{} failed to execute{}. {}",
                    quoted,
                    target,
                    if error {
                        "An error occurred when we tried to find a path or send a transaction for this action."
                    } else {
                        "You may not have the required permissions."
                    }
                ),
            }
        }
    }
}

pub fn status_label(status: SigningStatus) -> Option<&'static str> {
    match status {
        SigningStatus::Confirming => None,
        SigningStatus::Signing => Some("Waiting for signature…"),
        SigningStatus::Signed => Some("Transaction signed!"),
        SigningStatus::Error => Some("Error signing the transaction"),
    }
}

pub fn status_info(status: SigningStatus, sign_error: Option<&str>, provider_id: &str) -> Option<String> {
    match status {
        SigningStatus::Confirming => None,
        SigningStatus::Signing => Some(format!(
            "Open {} to sign your transaction.",
            provider_string(provider_id)
        )),
        SigningStatus::Signed => {
            Some("Success! Your transaction has been sent to the network for processing.".to_string())
        }
        SigningStatus::Error => {
            let mut info = "Woops, something went wrong. The transaction hasn’t been signed and no tokens have been sent."
                .to_string();
            if let Some(error) = sign_error {
                info.push_str(&format!("\nError: “{}”", clean_error_message(error)));
            }
            Some(info)
        }
    }
}
