//! Classpath handling for Grove projects.
//!
//! Resolving a classpath means running the build tool, which takes seconds to minutes. This
//! crate caches resolved classpaths per workspace on disk, validated by cheap build-file stamps,
//! and indexes classpath contents so many project scopes can share one index.

mod cache;
mod discover;
mod entry;
mod error;
mod index;
mod record;
mod resolver;
mod stamp;

pub use cache::{ClasspathCache, DEFAULT_SAMPLE_SIZE};
pub use discover::discover_projects;
pub use entry::ClasspathEntry;
pub use error::ClasspathError;
pub use index::{ClassLocation, ClasspathIndex};
pub use record::{ClasspathRecord, ProjectRecord, CLASSPATH_CACHE_VERSION};
pub use resolver::{ClasspathResolver, ResolvedClasspath};
pub use stamp::{file_stamp, project_stamps, DEFAULT_BUILD_FILE_NAMES};
