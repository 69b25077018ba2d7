use rayon::ThreadPool;

/// Worker pool for background compiles and classpath resolution.
pub(crate) enum CompilePool {
    Rayon(ThreadPool),
    Inline,
}

impl CompilePool {
    pub(crate) fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            CompilePool::Rayon(pool) => pool.spawn(job),
            CompilePool::Inline => job(),
        }
    }

    pub(crate) fn threads(&self) -> usize {
        match self {
            CompilePool::Rayon(pool) => pool.current_num_threads(),
            CompilePool::Inline => 0,
        }
    }
}

pub(crate) fn build_compile_pool(prefix: &'static str, threads: usize) -> CompilePool {
    // Thread creation can fail under low process limits; shrink the pool rather than fail.
    let mut threads = threads.max(1);
    loop {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |idx| format!("{prefix}-{idx}"))
            .build()
        {
            Ok(pool) => return CompilePool::Rayon(pool),
            Err(err) if threads > 1 => {
                tracing::debug!(target: "grove.workspace", threads, error = %err, "shrinking compile pool");
                threads = (threads / 2).max(1);
            }
            Err(err) => {
                tracing::warn!(
                    target: "grove.workspace",
                    error = %err,
                    "failed to start compile threads; running jobs inline"
                );
                return CompilePool::Inline;
            }
        }
    }
}
