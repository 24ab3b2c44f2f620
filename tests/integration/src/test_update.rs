//! Update compilation: clause grouping, key protection, placeholder sharing.

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone;
    use dynexpr_core::{AttributeValue, ExpressionError, KeyRole, UpdateClause, UpdateExpression, values};

    use crate::{Account, assert_distinct_value_tokens, init_tracing, value_tokens};

    #[test]
    fn test_should_compile_update_with_guard() {
        init_tracing();
        let update = UpdateExpression::<Account>::new()
            .update([
                Account::STATUS.set("frozen"),
                Account::BALANCE.increment(-250),
                Account::LABELS.add_elements(BTreeSet::from(["audit".to_owned()])),
                Account::HISTORY.append(vec!["frozen by ops".to_owned()]),
            ])
            .condition(Account::STATUS.ne("closed") & Account::BALANCE.ge(250))
            .build()
            .unwrap();

        assert_eq!(
            update.update_expression,
            "SET #status = :p0, #history = list_append(#history, :p3) ADD #balance :p1, #labels :p2"
        );
        assert_eq!(
            update.condition_expression.as_deref(),
            Some("#status <> :p4 AND #balance >= :p5")
        );
        assert_eq!(
            update.expression_attribute_values[":p1"],
            AttributeValue::N("-250".to_owned())
        );
        assert_eq!(
            update.expression_attribute_values[":p3"],
            AttributeValue::L(vec![AttributeValue::from("frozen by ops")])
        );
    }

    #[test]
    fn test_should_keep_value_tokens_distinct_across_fragments() {
        init_tracing();
        let update = UpdateExpression::<Account>::new()
            .condition(Account::BALANCE.lt(0))
            .update([
                Account::STATUS.set("active"),
                Account::LABELS.add_elements(BTreeSet::from(["reopened".to_owned()])),
            ])
            .update_format(UpdateClause::Set, "#balance = #balance + {0}", &values![10])
            .condition_format("#status <> {0}", &values!["closed"])
            .build()
            .unwrap();

        let condition = update.condition_expression.clone().unwrap_or_default();
        assert_distinct_value_tokens([update.update_expression.as_str(), condition.as_str()]);

        let referenced = value_tokens(&update.update_expression).len() + value_tokens(&condition).len();
        assert_eq!(referenced, update.expression_attribute_values.len());
        assert_eq!(referenced, 5);
    }

    #[test]
    fn test_should_refuse_to_update_partition_key() {
        init_tracing();
        let err = UpdateExpression::<Account>::new()
            .update([Account::STATUS.set("moved"), Account::ACCOUNT_ID.set("acct-2")])
            .build()
            .unwrap_err();
        match err {
            ExpressionError::InvalidUpdateOperation { property, role } => {
                assert_eq!(property, "AccountId");
                assert_eq!(role, KeyRole::Partition);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_should_refuse_to_remove_sort_key() {
        init_tracing();
        let err = UpdateExpression::<Account>::new()
            .update([Account::OPENED_ON.remove()])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ExpressionError::InvalidUpdateOperation { role: KeyRole::Sort, .. }
        ));
    }

    #[test]
    fn test_should_remove_and_delete_in_clause_order() {
        init_tracing();
        let update = UpdateExpression::<Account>::new()
            .update([
                Account::LABELS.delete_elements(BTreeSet::from(["trial".to_owned()])),
                Account::HISTORY.remove(),
            ])
            .build()
            .unwrap();
        assert_eq!(update.update_expression, "REMOVE #history DELETE #labels :p0");
        assert_eq!(update.condition_expression, None);

        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["UpdateExpression"], "REMOVE #history DELETE #labels :p0");
        assert!(json.get("ConditionExpression").is_none());
        assert_eq!(json["ExpressionAttributeValues"][":p0"]["SS"][0], "trial");
    }

    #[test]
    fn test_should_clear_formatted_optional_property() {
        init_tracing();
        let update = UpdateExpression::<Account>::new()
            .update([Account::CLOSED_ON.set(None)])
            .condition(Account::CLOSED_ON.ne(None) | Account::CLOSED_ON.not_exists())
            .build()
            .unwrap();
        assert_eq!(update.update_expression, "SET #closed_on = :p0");
        assert_eq!(update.expression_attribute_values[":p0"], AttributeValue::Null(true));
        assert_eq!(update.expression_attribute_values[":p1"], AttributeValue::Null(true));

        let closed = chrono::Utc.with_ymd_and_hms(2024, 5, 2, 22, 0, 0).unwrap();
        let update = UpdateExpression::<Account>::new()
            .update([Account::CLOSED_ON.set(Some(closed))])
            .build()
            .unwrap();
        assert_eq!(
            update.expression_attribute_values[":p0"],
            AttributeValue::S("2024-05-02".to_owned())
        );
    }
}
