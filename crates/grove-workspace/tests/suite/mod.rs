mod support;

mod classpath;
mod diagnostics;
mod full;
mod incremental;
mod placeholder;
mod scopes;
