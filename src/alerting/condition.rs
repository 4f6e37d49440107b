use crate::db::enums::Operator;

/// Compares a metric value against a rule threshold.
pub fn evaluate(value: f64, operator: Operator, threshold: f64) -> bool {
    match operator {
        Operator::GreaterThan => value > threshold,
        Operator::LessThan => value < threshold,
        Operator::GreaterOrEqual => value >= threshold,
        Operator::LessOrEqual => value <= threshold,
        Operator::Equal => (value - threshold).abs() < f64::EPSILON,
        Operator::NotEqual => (value - threshold).abs() >= f64::EPSILON,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_operators() {
        assert!(evaluate(87.5, Operator::GreaterThan, 80.0));
        assert!(!evaluate(80.0, Operator::GreaterThan, 80.0));
        assert!(evaluate(80.0, Operator::GreaterOrEqual, 80.0));
        assert!(!evaluate(79.9, Operator::GreaterOrEqual, 80.0));
        assert!(evaluate(1.0, Operator::LessThan, 2.0));
        assert!(!evaluate(2.0, Operator::LessThan, 2.0));
        assert!(evaluate(2.0, Operator::LessOrEqual, 2.0));
        assert!(!evaluate(2.1, Operator::LessOrEqual, 2.0));
    }

    #[test]
    fn equality_tolerates_float_noise() {
        assert!(evaluate(0.1 + 0.2, Operator::Equal, 0.3));
        assert!(!evaluate(0.1 + 0.2, Operator::NotEqual, 0.3));
        assert!(evaluate(3.0, Operator::NotEqual, 4.0));
        assert!(!evaluate(3.0, Operator::Equal, 4.0));
    }

    #[test]
    fn equal_and_not_equal_are_complementary() {
        for (value, threshold) in [(0.0, 0.0), (5.0, 5.5), (-1.0, -1.0), (1e9, 1e9 + 1.0)] {
            assert_ne!(
                evaluate(value, Operator::Equal, threshold),
                evaluate(value, Operator::NotEqual, threshold)
            );
        }
    }
}
