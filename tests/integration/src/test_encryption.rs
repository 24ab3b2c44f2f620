//! Encrypted properties across condition and update compilation.

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::sync::Arc;

    use bytes::Bytes;
    use dynexpr_core::{
        AttributeValue, ConditionExpression, ExpressionError, ScanExpression, UpdateExpression,
    };

    use crate::{Account, TaggingEncryptor, UnavailableEncryptor, init_tracing};

    #[test]
    fn test_should_require_encryptor_for_encrypted_update() {
        init_tracing();
        let err = UpdateExpression::<Account>::new()
            .update([Account::CARD_NUMBER.set("4111111111111111")])
            .build()
            .unwrap_err();
        match err {
            ExpressionError::EncryptionRequired { property } => assert_eq!(property, "CardNumber"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_should_store_ciphertext_from_encryptor() {
        init_tracing();
        let update = UpdateExpression::<Account>::new()
            .with_encryptor(Arc::new(TaggingEncryptor))
            .update([Account::CARD_NUMBER.set("4111"), Account::STATUS.set("active")])
            .build()
            .unwrap();

        assert_eq!(update.update_expression, "SET #card = :p0, #status = :p1");
        assert_eq!(
            update.expression_attribute_values[":p0"],
            AttributeValue::B(Bytes::from_static(b"accounts/card:1114"))
        );
        // non-encrypted properties are untouched
        assert_eq!(update.expression_attribute_values[":p1"], AttributeValue::from("active"));
    }

    #[test]
    fn test_should_encrypt_condition_values() {
        init_tracing();
        let guard = ConditionExpression::<Account>::new()
            .with_encryptor(Arc::new(TaggingEncryptor))
            .condition(Account::CARD_NUMBER.eq("12"))
            .build()
            .unwrap();
        assert_eq!(guard.expression, "#card = :p0");
        assert_eq!(
            guard.values[":p0"],
            AttributeValue::B(Bytes::from_static(b"accounts/card:21"))
        );
    }

    #[test]
    fn test_should_surface_encryptor_failure() {
        init_tracing();
        let err = ScanExpression::<Account>::new()
            .with_encryptor(Arc::new(UnavailableEncryptor))
            .filter(Account::CARD_NUMBER.eq("4111"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ExpressionError::EncoderFailed { ref property, .. } if property == "CardNumber"));
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("key service unavailable")
        );
    }

    #[test]
    fn test_should_not_leak_members_of_encrypted_map() {
        init_tracing();
        let pin = Account::VAULT.field::<String>("pin");

        let err = UpdateExpression::<Account>::new()
            .update([pin.set("1234")])
            .build()
            .unwrap_err();
        assert!(matches!(err, ExpressionError::EncryptionRequired { ref property } if property == "Vault"));

        let err = ConditionExpression::<Account>::new()
            .condition(pin.eq("1234"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ExpressionError::EncryptionRequired { ref property } if property == "Vault"));

        let update = UpdateExpression::<Account>::new()
            .with_encryptor(Arc::new(TaggingEncryptor))
            .update([pin.set("1234")])
            .build()
            .unwrap();
        assert_eq!(update.update_expression, "SET #vault.#pin = :p0");
        assert_eq!(
            update.expression_attribute_values[":p0"],
            AttributeValue::B(Bytes::from_static(b"accounts/vault:4321"))
        );
    }
}
