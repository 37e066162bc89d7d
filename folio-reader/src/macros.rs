// With the `tracing` feature off every call site compiles to nothing.

#[cfg(feature = "tracing")]
macro_rules! log_event {
    ($level:ident, $($tt:tt)*) => {
        tracing::event!(target: "folio_reader", tracing::Level::$level, $($tt)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! log_event {
    ($level:ident, $($tt:tt)*) => {};
}

macro_rules! vtrace {
    ($($tt:tt)*) => {
        log_event!(TRACE, $($tt)*)
    };
}

macro_rules! vdebug {
    ($($tt:tt)*) => {
        log_event!(DEBUG, $($tt)*)
    };
}

macro_rules! vwarn {
    ($($tt:tt)*) => {
        log_event!(WARN, $($tt)*)
    };
}
