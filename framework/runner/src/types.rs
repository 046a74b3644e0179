/// Recommended error type for your scenario `main` function and any shared code that you write
/// for scenario methods. This type is compatible with the [crate::definition::HookResult] type so
/// you can use `?` to propagate errors.
pub type CloudstormResult<T> = anyhow::Result<T>;
