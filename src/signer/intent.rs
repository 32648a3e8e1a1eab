//! What a signing request actually does, once forwarding hops are peeled off.

use crate::apps::FrontendApp;
use crate::transaction::{AnnotatedDescription, Transaction, TransactionBag};
use crate::utils::address::addresses_equal;

/// The call the user means to make
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Intent {
    pub annotated_description: Option<Vec<AnnotatedDescription>>,
    pub description: String,
    /// Display name of the target app, empty when unknown
    pub name: String,
    pub to: String,
    /// The transaction requested, sent as-is on a direct path
    pub transaction: Transaction,
}

/// Derive the intent of a request.
///
/// With forwarders in the path the last node is the intended call. A direct
/// call names its target by looking the address up among the installed apps.
pub fn transaction_intent(bag: &TransactionBag, apps: &[FrontendApp]) -> Intent {
    let transaction = &bag.transaction;

    if let [_, .., last] = bag.path.as_slice() {
        return Intent {
            annotated_description: last.annotated_description.clone(),
            description: last.description.clone(),
            name: last.name.clone(),
            to: last.to.clone(),
            transaction: transaction.clone(),
        };
    }

    let name = apps
        .iter()
        .find(|app| addresses_equal(app.proxy_address(), &transaction.to))
        .map(|app| app.name().to_string())
        .unwrap_or_default();

    Intent {
        annotated_description: transaction.annotated_description.clone(),
        description: transaction.description.clone(),
        name,
        to: transaction.to.clone(),
        transaction: transaction.clone(),
    }
}

/// Confirmation fields derived from a fresh request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BagState {
    pub intent: Intent,
    pub direct: bool,
    /// Candidate paths; empty when the request can't be executed
    pub action_paths: Vec<Vec<Transaction>>,
    pub pretransaction: Option<Transaction>,
}

pub fn state_from_bag(bag: &TransactionBag, apps: &[FrontendApp]) -> BagState {
    let path = &bag.path;
    BagState {
        intent: transaction_intent(bag, apps),
        direct: path.len() == 1,
        action_paths: if path.is_empty() { Vec::new() } else { vec![path.clone()] },
        pretransaction: bag.transaction.pretransaction.as_deref().cloned(),
    }
}
