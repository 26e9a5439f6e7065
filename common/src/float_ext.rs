pub trait FloatExt {
    fn approximately_eq(self, other: Self) -> bool;
}

impl FloatExt for f64 {
    fn approximately_eq(self, other: Self) -> bool {
        (self - other).abs() < crate::EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f64_approximately_eq() {
        assert!(1.0_f64.approximately_eq(1.0));
        assert!((0.1_f64 + 0.2_f64).approximately_eq(0.3));
        assert!(!1.0_f64.approximately_eq(1.0001));
    }

    #[test]
    fn nan_is_never_equal() {
        assert!(!f64::NAN.approximately_eq(f64::NAN));
    }
}
