macro_rules! into_ok {
    ($expr: expr) => {
        match $expr {
            ::std::result::Result::Ok(ok) => ok,
            ::std::result::Result::Err(e) => match e {},
        }
    };
}

/// Structured log events, gated behind the `tracing` crate at named
/// operational boundaries (engine lifecycle, commands, transactions).
macro_rules! debug_log {
    (ENGINE: $($arg:tt)+) => {
        ::tracing::debug!(target: "docudb::engine", $($arg)+)
    };
    (COMMAND: $($arg:tt)+) => {
        ::tracing::debug!(target: "docudb::command", $($arg)+)
    };
    (TRANSACTION: $($arg:tt)+) => {
        ::tracing::debug!(target: "docudb::transaction", $($arg)+)
    };
    (LOCK: $($arg:tt)+) => {
        ::tracing::debug!(target: "docudb::lock", $($arg)+)
    };
    (DISK: $($arg:tt)+) => {
        ::tracing::debug!(target: "docudb::disk", $($arg)+)
    };
    (WAL: $($arg:tt)+) => {
        ::tracing::debug!(target: "docudb::wal", $($arg)+)
    };
}

/// Wraps a method already implemented on `TransactionLiteEngine` into an
/// auto-commit entrypoint on `LiteEngine`: opens a transaction, runs the
/// body, commits on success and rolls back on error.
macro_rules! transaction_wrapper {
    (pub async fn $name:ident(&mut self $(, $arg:ident : $ty:ty)* $(,)?) -> $ret:ty) => {
        impl<SF: StreamFactory> LiteEngine<SF> {
            pub async fn $name(&self $(, $arg: $ty)*) -> $ret {
                self.with_transaction(async move |engine| {
                    engine.$name($($arg),*).await
                })
                .await
            }
        }
    };
}

/// Implements [`crate::engine::utils::ExtendLifetime`] for a reference-holding
/// type by transmuting its lifetime parameter. Only sound because the
/// target is immediately re-borrowed from a `PartialBorrower`-tracked owner
/// that outlives it.
macro_rules! extend_lifetime {
    ($name:ident) => {
        unsafe impl<'target, 'longer: 'target> crate::engine::utils::ExtendLifetime<'longer>
            for $name<'target>
        {
            type Extended = $name<'longer>;

            unsafe fn extend_lifetime(self) -> Self::Extended {
                unsafe { ::std::mem::transmute::<$name<'target>, $name<'longer>>(self) }
            }
        }
    };
}
