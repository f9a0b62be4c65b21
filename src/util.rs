/// Checks that a numerical value is in the provided interval `[a,b]` and returns
/// early with a configuration error carrying a helpful message if not
///
/// ### Example
/// ```ignore
/// let gamma = 2.0;
/// check_interval!(gamma, 0.0, 1.0);
/// ```
/// This returns `Err(Error::Config("Invalid value for \`gamma\`. Must be in the interval [0, 1]."))`.
macro_rules! check_interval {
    ($var:expr, $a:expr, $b:expr) => {
        if !($var >= $a && $var <= $b) {
            return Err($crate::error::Error::Config(format!(
                "Invalid value for `{}`. Must be in the interval [{}, {}].",
                stringify!($var),
                $a,
                $b,
            )));
        }
    };
}

pub(crate) use check_interval;
