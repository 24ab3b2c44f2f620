//! Format-template compilation.

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use dynexpr_core::{AttributeValue, ExpressionError, ScanExpression, compile_format, values};

    use crate::{Account, init_tracing};

    #[test]
    fn test_should_compile_key_prefix_template() {
        init_tracing();
        let compiled =
            compile_format("pk = {0} AND begins_with(sk, {1})", &values!["USER#123", "ORDER#"]).unwrap();
        assert_eq!(compiled.expression, "pk = :p0 AND begins_with(sk, :p1)");
        assert!(compiled.names.is_empty());
        assert_eq!(compiled.values[":p0"], AttributeValue::S("USER#123".to_owned()));
        assert_eq!(compiled.values[":p1"], AttributeValue::S("ORDER#".to_owned()));
    }

    #[test]
    fn test_should_format_round_trip_dates() {
        init_tracing();
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let compiled =
            compile_format("created BETWEEN {0:o} AND {1:o}", &values![from, to]).unwrap();
        assert_eq!(compiled.expression, "created BETWEEN :p0 AND :p1");
        assert_eq!(
            compiled.values[":p0"],
            AttributeValue::S("2024-01-01T00:00:00.0000000Z".to_owned())
        );
        assert_eq!(
            compiled.values[":p1"],
            AttributeValue::S("2024-12-31T23:59:59.0000000Z".to_owned())
        );
    }

    #[test]
    fn test_should_format_numbers_without_locale() {
        init_tracing();
        let compiled = compile_format(
            "amount = {0:F2} AND code = {1:D6} AND label = {2:N0}",
            &values![1234.5, 42, 1_234_567],
        )
        .unwrap();
        assert_eq!(compiled.values[":p0"], AttributeValue::N("1234.50".to_owned()));
        assert_eq!(compiled.values[":p1"], AttributeValue::N("000042".to_owned()));
        assert_eq!(compiled.values[":p2"], AttributeValue::S("1,234,567".to_owned()));
    }

    #[test]
    fn test_should_keep_escaped_braces() {
        init_tracing();
        let compiled = compile_format("doc = {{literal}} AND n = {0}", &values![1]).unwrap();
        assert_eq!(compiled.expression, "doc = {literal} AND n = :p0");
    }

    #[test]
    fn test_should_reject_missing_argument() {
        init_tracing();
        let err = compile_format("a = {0} AND b = {1}", &values!["only"]).unwrap_err();
        assert!(matches!(err, ExpressionError::UnsupportedExpression { .. }));
    }

    #[test]
    fn test_should_share_placeholder_space_with_typed_filters() {
        init_tracing();
        let scan = ScanExpression::<Account>::new()
            .filter_format("#note = {0}", &values!["x"])
            .filter(Account::STATUS.eq("active"))
            .filter_format("#status <> {0}", &values!["void"])
            .build()
            .unwrap();
        assert_eq!(
            scan.filter_expression.as_deref(),
            Some("(#note = :p0) AND (#status = :p1) AND (#status <> :p2)")
        );
        assert_eq!(scan.expression_attribute_values.len(), 3);
    }
}
