//! Query and scan compilation against the `accounts` fixture.

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use dynexpr_core::{AttributeValue, ExpressionError, QueryExpression, ScanExpression, values};

    use crate::{Account, assert_distinct_value_tokens, init_tracing};

    #[test]
    fn test_should_compile_query_with_formatted_sort_key_range() {
        init_tracing();
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 31, 23, 0, 0).unwrap();

        let query = QueryExpression::<Account>::new()
            .key_condition(Account::ACCOUNT_ID.eq("acct-1") & Account::OPENED_ON.between(from, to))
            .filter(Account::BALANCE.gt(0))
            .project(&Account::STATUS)
            .project(&Account::BALANCE)
            .build()
            .unwrap();

        assert_eq!(
            query.key_condition_expression,
            "#pk = :p0 AND #sk BETWEEN :p1 AND :p2"
        );
        assert_eq!(query.filter_expression.as_deref(), Some("#balance > :p3"));
        assert_eq!(query.projection_expression.as_deref(), Some("#status, #balance"));
        assert_eq!(
            query.expression_attribute_values[":p1"],
            AttributeValue::S("2024-01-01".to_owned())
        );
        assert_eq!(
            query.expression_attribute_values[":p2"],
            AttributeValue::S("2024-01-31".to_owned())
        );
        assert_eq!(query.expression_attribute_names["#sk"], "sk");
        assert_distinct_value_tokens([
            query.key_condition_expression.as_str(),
            query.filter_expression.as_deref().unwrap_or_default(),
        ]);
    }

    #[test]
    fn test_should_name_non_key_property_in_key_condition_error() {
        init_tracing();
        let err = QueryExpression::<Account>::new()
            .key_condition(Account::ACCOUNT_ID.eq("acct-1") & Account::BALANCE.gt(10))
            .build()
            .unwrap_err();
        match err {
            ExpressionError::InvalidKeyExpression { property, .. } => assert_eq!(property, "Balance"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_should_reject_disjunction_in_key_condition() {
        init_tracing();
        let err = QueryExpression::<Account>::new()
            .key_condition(Account::ACCOUNT_ID.eq("a") | Account::ACCOUNT_ID.eq("b"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ExpressionError::UnsupportedExpression { ref kind, .. } if kind == "OR"));
    }

    #[test]
    fn test_should_query_secondary_index() {
        init_tracing();
        let query = QueryExpression::<Account>::new()
            .using_index("by-status")
            .key_condition(Account::STATUS.eq("active") & Account::BALANCE.ge(1_000))
            .filter(Account::LABELS.contains("vip"))
            .build()
            .unwrap();
        assert_eq!(query.index_name.as_deref(), Some("by-status"));
        assert_eq!(query.key_condition_expression, "#status = :p0 AND #balance >= :p1");
        assert_eq!(query.filter_expression.as_deref(), Some("contains(#labels, :p2)"));

        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["IndexName"], "by-status");
        assert_eq!(json["ExpressionAttributeValues"][":p1"]["N"], "1000");
    }

    #[test]
    fn test_should_mix_typed_and_template_key_conditions() {
        init_tracing();
        let query = QueryExpression::<Account>::new()
            .key_condition(Account::ACCOUNT_ID.eq("acct-1"))
            .key_condition_format("begins_with(#sk, {0})", &values!["2024-"])
            .build()
            .unwrap();
        assert_eq!(
            query.key_condition_expression,
            "(#pk = :p0) AND (begins_with(#sk, :p1))"
        );
        assert_eq!(query.expression_attribute_values[":p1"], AttributeValue::from("2024-"));
    }

    #[test]
    fn test_should_compile_status_equality_filter() {
        init_tracing();
        let scan = ScanExpression::<Account>::new()
            .filter(Account::STATUS.eq("active"))
            .build()
            .unwrap();
        assert_eq!(scan.filter_expression.as_deref(), Some("#status = :p0"));
        assert_eq!(scan.expression_attribute_names.len(), 1);
        assert_eq!(scan.expression_attribute_names["#status"], "status");
        assert_eq!(
            scan.expression_attribute_values[":p0"],
            AttributeValue::S("active".to_owned())
        );
    }

    #[test]
    fn test_should_compile_negated_scan_filter() {
        init_tracing();
        let scan = ScanExpression::<Account>::new()
            .filter(!(Account::STATUS.eq("closed") | Account::HISTORY.size().gt(100)))
            .build()
            .unwrap();
        assert_eq!(
            scan.filter_expression.as_deref(),
            Some("NOT (#status = :p0 OR size(#history) > :p1)")
        );
    }
}
