pub(crate) fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}

pub(crate) fn float2_or_dash(n: &Option<f64>) -> String {
    n.as_ref().map(float2).unwrap_or_else(|| "-".to_string())
}
