//! Put/delete guards.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use dynexpr_core::{AttributeValue, ConditionExpression, ExpressionError, Property};

    use crate::{Account, init_tracing};

    #[test]
    fn test_should_guard_put_against_overwrite() {
        init_tracing();
        let guard = ConditionExpression::<Account>::new()
            .condition(Account::ACCOUNT_ID.not_exists() & Account::OPENED_ON.not_exists())
            .build()
            .unwrap();
        assert_eq!(
            guard.expression,
            "attribute_not_exists(#pk) AND attribute_not_exists(#sk)"
        );
        assert!(guard.values.is_empty());
    }

    #[test]
    fn test_should_guard_delete_with_type_and_size_checks() {
        init_tracing();
        let guard = ConditionExpression::<Account>::new()
            .condition(Account::BALANCE.attribute_type("N"))
            .condition(Account::HISTORY.size().between(1, 10) | Account::STATUS.is_in(["closed", "void"]))
            .build()
            .unwrap();
        assert_eq!(
            guard.expression,
            "(attribute_type(#balance, :p0)) AND (size(#history) BETWEEN :p1 AND :p2 OR #status IN (:p3, :p4))"
        );
        assert_eq!(guard.values[":p0"], AttributeValue::from("N"));
        assert_eq!(guard.values[":p2"], AttributeValue::N("10".to_owned()));
    }

    #[test]
    fn test_should_reject_unknown_type_descriptor() {
        init_tracing();
        let err = ConditionExpression::<Account>::new()
            .condition(Account::BALANCE.attribute_type("INT"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ExpressionError::UnsupportedExpression { .. }));
    }

    #[test]
    fn test_should_report_unmapped_property() {
        init_tracing();
        let nickname: Property<Account, String> = Property::new("Nickname");
        let err = ConditionExpression::<Account>::new()
            .condition(nickname.exists())
            .build()
            .unwrap_err();
        match err {
            ExpressionError::UnmappedProperty { entity, property } => {
                assert_eq!(entity, "accounts");
                assert_eq!(property, "Nickname");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_should_fail_closed_on_conflicting_raw_name() {
        init_tracing();
        let err = ConditionExpression::<Account>::new()
            .condition(Account::STATUS.exists())
            .condition_raw(
                "#status = :s",
                HashMap::from([("#status".to_owned(), "state".to_owned())]),
                HashMap::from([(":s".to_owned(), AttributeValue::from("open"))]),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, ExpressionError::PlaceholderConflict { ref token, .. } if token == "#status"));
    }
}
