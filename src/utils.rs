//! Common, shared DSP and test tools.

pub mod dsp;

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
macro_rules! assert_eq_with_epsilon {
    ($x:expr, $y:expr, $d:expr) => {
        if !(($x - $y).abs() < $d) {
            panic!(
                "assertion failed: `{} ~= {}` (epsilon: {})",
                $x, $y, $d
            );
        }
    };
}

#[cfg(test)]
pub(crate) use assert_eq_with_epsilon;
