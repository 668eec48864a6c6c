//! The process-wide pipeline cache.
//!
//! Lookups are parallel-safe: a guarded map de-duplicates compiles, a
//! lookup that observes an in-flight entry blocks on its completion
//! instead of starting a second compile. Entries live for the cache's
//! lifetime; there is no eviction.

use std::sync::Arc;
use std::thread;

use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::key::{
    ComputePipelineDesc, ComputePipelineKey, GraphicsPipelineDesc, GraphicsPipelineKey,
    StageVariants,
};

#[derive(Clone, Debug, Error)]
#[error("pipeline compilation failed: {what}")]
pub struct CompileError {
    pub what: String,
}

/// The compiled artifact. Contents are opaque to the cache; at minimum
/// it carries a handle per compiled function.
#[derive(Clone, Debug)]
pub struct PipelineHandle {
    /// (entry point name, AIR module text) per stage function.
    pub functions: Vec<(String, Arc<str>)>,
}

/// Backend hook performing the actual compilation. Implementations run
/// on the cache's worker threads.
pub trait PipelineCompiler: Send + Sync + 'static {
    fn compile_graphics(
        &self,
        key: &GraphicsPipelineKey,
        variants: &StageVariants,
    ) -> Result<PipelineHandle, CompileError>;

    fn compile_compute(&self, key: &ComputePipelineKey) -> Result<PipelineHandle, CompileError>;
}

#[derive(Debug)]
enum PipelineState {
    Pending,
    Ready(PipelineHandle),
    Failed(CompileError),
}

/// A cache entry. Created in the pending state by the first requester;
/// everyone else waits on the condvar.
#[derive(Debug)]
pub struct CompiledPipeline {
    state: Mutex<PipelineState>,
    ready: Condvar,
}

impl CompiledPipeline {
    fn new() -> Self {
        Self {
            state: Mutex::new(PipelineState::Pending),
            ready: Condvar::new(),
        }
    }

    fn finish(&self, result: Result<PipelineHandle, CompileError>) {
        let mut state = self.state.lock();
        *state = match result {
            Ok(handle) => PipelineState::Ready(handle),
            Err(err) => {
                tracing::error!(what = %err.what, "pipeline compilation failed");
                PipelineState::Failed(err)
            }
        };
        self.ready.notify_all();
    }

    pub fn is_ready(&self) -> bool {
        !matches!(*self.state.lock(), PipelineState::Pending)
    }

    /// Blocks until compilation finishes. A failed compile yields
    /// `None`, observable by the caller.
    pub fn get_pipeline(&self) -> Option<PipelineHandle> {
        let mut state = self.state.lock();
        while matches!(*state, PipelineState::Pending) {
            self.ready.wait(&mut state);
        }
        match &*state {
            PipelineState::Ready(handle) => Some(handle.clone()),
            PipelineState::Failed(_) => None,
            PipelineState::Pending => unreachable!(),
        }
    }
}

/// Maps pipeline fingerprints to compiled pipelines, compiling each
/// fingerprint at most once.
pub struct PipelineCache<C> {
    compiler: Arc<C>,
    graphics: Mutex<HashMap<GraphicsPipelineKey, Arc<CompiledPipeline>>>,
    compute: Mutex<HashMap<ComputePipelineKey, Arc<CompiledPipeline>>>,
}

impl<C> PipelineCache<C>
where
    C: PipelineCompiler,
{
    pub fn new(compiler: C) -> Self {
        Self {
            compiler: Arc::new(compiler),
            graphics: Mutex::new(HashMap::new()),
            compute: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the pipeline for the descriptor's fingerprint, starting
    /// a compile if this fingerprint was never seen.
    pub fn get_graphics(&self, desc: &GraphicsPipelineDesc) -> Arc<CompiledPipeline> {
        let key = GraphicsPipelineKey::new(desc);

        let mut graphics = self.graphics.lock();
        if let Some(pipeline) = graphics.get(&key) {
            return pipeline.clone();
        }

        let pipeline = Arc::new(CompiledPipeline::new());
        graphics.insert(key.clone(), pipeline.clone());
        // Release the map before compilation; later lookups of the same
        // key must find the pending entry instead of blocking the map.
        drop(graphics);

        tracing::debug!(vertex_shader = %key.vertex_shader(), "compiling graphics pipeline");

        let compiler = self.compiler.clone();
        let entry = pipeline.clone();
        thread::spawn(move || {
            let variants = key.stage_variants();
            let result = compiler.compile_graphics(&key, &variants);
            entry.finish(result);
        });

        pipeline
    }

    pub fn get_compute(&self, desc: &ComputePipelineDesc) -> Arc<CompiledPipeline> {
        let key = ComputePipelineKey::new(desc);

        let mut compute = self.compute.lock();
        if let Some(pipeline) = compute.get(&key) {
            return pipeline.clone();
        }

        let pipeline = Arc::new(CompiledPipeline::new());
        compute.insert(key.clone(), pipeline.clone());
        drop(compute);

        let compiler = self.compiler.clone();
        let entry = pipeline.clone();
        thread::spawn(move || {
            let result = compiler.compile_compute(&key);
            entry.finish(result);
        });

        pipeline
    }

    pub fn len(&self) -> usize {
        self.graphics.lock().len() + self.compute.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::{
        CompileError, PipelineCache, PipelineCompiler, PipelineHandle,
    };
    use crate::key::{
        ComputePipelineKey, GraphicsPipelineDesc, GraphicsPipelineKey, PixelFormat, StageVariants,
    };
    use crate::shader_id::ShaderId;

    struct CountingCompiler {
        compiles: AtomicU32,
        delay: Duration,
        fail: bool,
    }

    impl CountingCompiler {
        fn new() -> Self {
            Self {
                compiles: AtomicU32::new(0),
                delay: Duration::from_millis(10),
                fail: false,
            }
        }
    }

    impl PipelineCompiler for CountingCompiler {
        fn compile_graphics(
            &self,
            _key: &GraphicsPipelineKey,
            variants: &StageVariants,
        ) -> Result<PipelineHandle, CompileError> {
            self.compiles.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            if self.fail {
                return Err(CompileError {
                    what: "forced failure".into(),
                });
            }
            let mut functions = vec![("vertex".to_string(), Arc::from("module"))];
            if variants.pixel.is_some() {
                functions.push(("fragment".to_string(), Arc::from("module")));
            }
            Ok(PipelineHandle { functions })
        }

        fn compile_compute(
            &self,
            _key: &ComputePipelineKey,
        ) -> Result<PipelineHandle, CompileError> {
            self.compiles.fetch_add(1, Ordering::SeqCst);
            Ok(PipelineHandle {
                functions: vec![("kernel".to_string(), Arc::from("module"))],
            })
        }
    }

    fn desc() -> GraphicsPipelineDesc {
        GraphicsPipelineDesc {
            vertex_shader: ShaderId::from_bytes(b"vs"),
            pixel_shader: Some(ShaderId::from_bytes(b"ps")),
            num_color_attachments: 1,
            color_attachment_formats: {
                let mut formats = [PixelFormat::Invalid; 8];
                formats[0] = PixelFormat::Bgra8Unorm;
                formats
            },
            ..Default::default()
        }
    }

    #[test]
    fn at_most_one_compile_per_fingerprint() {
        let cache = Arc::new(PipelineCache::new(CountingCompiler::new()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                let pipeline = cache.get_graphics(&desc());
                pipeline.get_pipeline()
            }));
        }
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(results.iter().all(|r| r.is_some()));
        assert_eq!(cache.compiler.compiles.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn second_get_returns_same_entry() {
        let cache = PipelineCache::new(CountingCompiler::new());
        let first = cache.get_graphics(&desc());
        let second = cache.get_graphics(&desc());
        assert!(Arc::ptr_eq(&first, &second));

        let a = first.get_pipeline().unwrap();
        let b = second.get_pipeline().unwrap();
        assert_eq!(a.functions.len(), b.functions.len());
        assert_eq!(cache.compiler.compiles.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_compile_is_observable() {
        let compiler = CountingCompiler {
            fail: true,
            ..CountingCompiler::new()
        };
        let cache = PipelineCache::new(compiler);
        let pipeline = cache.get_graphics(&desc());
        assert!(pipeline.get_pipeline().is_none());
        assert!(pipeline.is_ready());
    }

    #[test]
    fn get_pipeline_blocks_until_ready() {
        let compiler = CountingCompiler {
            delay: Duration::from_millis(50),
            ..CountingCompiler::new()
        };
        let cache = PipelineCache::new(compiler);
        let pipeline = cache.get_graphics(&desc());
        // Very likely still compiling at this point; either way the
        // blocking call must return a ready pipeline.
        let handle = pipeline.get_pipeline().unwrap();
        assert!(pipeline.is_ready());
        assert_eq!(handle.functions.len(), 2);
    }

    #[test]
    fn distinct_fingerprints_compile_separately() {
        let cache = PipelineCache::new(CountingCompiler::new());
        let a = cache.get_graphics(&desc());
        let mut other = desc();
        other.sample_mask = 0xFFFF;
        let b = cache.get_graphics(&other);
        assert!(!Arc::ptr_eq(&a, &b));
        a.get_pipeline().unwrap();
        b.get_pipeline().unwrap();
        assert_eq!(cache.compiler.compiles.load(Ordering::SeqCst), 2);
    }
}
