/// Host callback run before a database is opened.
///
/// Returning `Err(reason)` aborts the open with
/// [`FilesError::HookRejected`](crate::FilesError::HookRejected).
pub trait OnOpen: Send + Sync {
    fn on_open(&self, name: &str) -> Result<(), String>;
}

/// Hook that allows every open.
pub struct NoOpHook;

impl OnOpen for NoOpHook {
    fn on_open(&self, _name: &str) -> Result<(), String> {
        Ok(())
    }
}

impl<F> OnOpen for F
where
    F: Fn(&str) -> Result<(), String> + Send + Sync,
{
    fn on_open(&self, name: &str) -> Result<(), String> {
        self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_hook_allows() {
        assert!(NoOpHook.on_open("db").is_ok());
    }

    #[test]
    fn closure_hook() {
        let hook = |name: &str| {
            if name.starts_with("secret") {
                Err(format!("{name} is off limits"))
            } else {
                Ok(())
            }
        };
        assert!(hook.on_open("public").is_ok());
        assert_eq!(hook.on_open("secret-db").unwrap_err(), "secret-db is off limits");
    }
}
