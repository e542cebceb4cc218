use common::CustomerId;

/// Who caused a change. Recorded on every stored event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Customer(CustomerId),
    Admin(String),
    /// The payment provider, via a verified webhook.
    PaymentProvider,
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::Customer(id) => write!(f, "customer:{id}"),
            Actor::Admin(id) => write!(f, "admin:{id}"),
            Actor::PaymentProvider => write!(f, "payment-webhook"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_labels() {
        let customer = CustomerId::new();
        assert_eq!(
            Actor::Customer(customer).to_string(),
            format!("customer:{customer}")
        );
        assert_eq!(Actor::Admin("ops".into()).to_string(), "admin:ops");
        assert_eq!(Actor::PaymentProvider.to_string(), "payment-webhook");
    }
}
