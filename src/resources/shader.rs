//! Shader programs
//!
//! Sources may pull in other files with `#include "relative/path"` on a line
//! of its own. Includes are resolved against the including file's directory
//! and expanded recursively.

use crate::backend::{ProgramDescriptor, ProgramHandle, SharedBackend, UniformValue};
use crate::resources::error::{LoadError, LoadResult};
use glam::{Mat4, Vec3};
use std::fs;
use std::path::{Path, PathBuf};

/// Expand `#include` directives of the shader at `path`
pub fn preprocess(path: &Path) -> LoadResult<String> {
    let mut stack = Vec::new();
    let mut output = String::new();
    expand(path, &mut stack, &mut output)?;
    Ok(output)
}

fn expand(path: &Path, stack: &mut Vec<PathBuf>, output: &mut String) -> LoadResult<()> {
    let key = fs::canonicalize(path).map_err(|e| LoadError::io(path, e))?;
    if stack.contains(&key) {
        return Err(LoadError::IncludeCycle(key));
    }
    let source = fs::read_to_string(&key).map_err(|e| LoadError::io(path, e))?;
    let dir = key.parent().map(Path::to_path_buf).unwrap_or_default();

    stack.push(key);
    for (number, line) in source.lines().enumerate() {
        let Some(rest) = line.trim_start().strip_prefix("#include") else {
            output.push_str(line);
            output.push('\n');
            continue;
        };
        let target = rest
            .trim()
            .strip_prefix('"')
            .and_then(|r| r.strip_suffix('"'))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| LoadError::MalformedInclude {
                path: path.to_path_buf(),
                line: number + 1,
            })?;
        expand(&dir.join(target), stack, output)?;
    }
    stack.pop();
    Ok(())
}

/// A compiled and linked shader program
pub struct ShaderProgram {
    backend: SharedBackend,
    handle: Option<ProgramHandle>,
    path: PathBuf,
}

impl ShaderProgram {
    /// Read `path` (expanding includes when `preprocess` is set) and compile it
    pub fn load(backend: &SharedBackend, path: &Path, preprocess: bool) -> LoadResult<Self> {
        let source = if preprocess {
            self::preprocess(path)?
        } else {
            fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?
        };
        let program = Self::from_source(backend, path, &source)?;
        log::info!("Loaded shader program {}", path.display());
        Ok(program)
    }

    /// Compile a program from in-memory source; `path` only labels it
    pub fn from_source(backend: &SharedBackend, path: &Path, source: &str) -> LoadResult<Self> {
        let desc = ProgramDescriptor {
            label: Some(path.display().to_string()),
            source: source.to_string(),
        };
        let handle = backend.lock().create_program(&desc)?;
        Ok(Self {
            backend: backend.clone(),
            handle: Some(handle),
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn failed(backend: &SharedBackend, path: &Path) -> Self {
        Self {
            backend: backend.clone(),
            handle: None,
            path: path.to_path_buf(),
        }
    }

    pub fn handle(&self) -> Option<ProgramHandle> {
        self.handle
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make this program current
    pub fn enable(&self) {
        match self.handle {
            Some(handle) => self.backend.lock().use_program(Some(handle)),
            None => log::warn!("Enabling shader {} which failed to load", self.path.display()),
        }
    }

    /// Clear the current program
    pub fn disable(&self) {
        self.backend.lock().use_program(None);
    }

    fn set(&self, name: &str, value: UniformValue) {
        if let Some(handle) = self.handle {
            self.backend.lock().set_uniform(handle, name, value);
        }
    }

    pub fn set_float(&self, name: &str, value: f32) {
        self.set(name, UniformValue::Float(value));
    }

    pub fn set_int(&self, name: &str, value: i32) {
        self.set(name, UniformValue::Int(value));
    }

    pub fn set_vec3(&self, name: &str, value: Vec3) {
        self.set(name, UniformValue::Vec3(value));
    }

    pub fn set_mat4(&self, name: &str, value: Mat4) {
        self.set(name, UniformValue::Mat4(value));
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.lock().destroy_program(handle);
        }
    }
}

impl std::fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("path", &self.path)
            .field("handle", &self.handle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;

    #[test]
    fn test_includes_expand_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("common")).unwrap();
        fs::write(
            dir.path().join("common/light.wgsl"),
            "// light\n#include \"math.wgsl\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("common/math.wgsl"), "// math\n").unwrap();
        fs::write(
            dir.path().join("main.wgsl"),
            "// main\n  #include \"common/light.wgsl\"\n// end\n",
        )
        .unwrap();

        let source = preprocess(&dir.path().join("main.wgsl")).unwrap();
        assert_eq!(source, "// main\n// light\n// math\n// end\n");
    }

    #[test]
    fn test_include_cycle_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.wgsl"), "#include \"b.wgsl\"\n").unwrap();
        fs::write(dir.path().join("b.wgsl"), "#include \"a.wgsl\"\n").unwrap();

        let result = preprocess(&dir.path().join("a.wgsl"));
        assert!(matches!(result, Err(LoadError::IncludeCycle(_))));
    }

    #[test]
    fn test_same_file_may_be_included_twice() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("part.wgsl"), "x\n").unwrap();
        fs::write(
            dir.path().join("main.wgsl"),
            "#include \"part.wgsl\"\n#include \"part.wgsl\"\n",
        )
        .unwrap();

        assert_eq!(preprocess(&dir.path().join("main.wgsl")).unwrap(), "x\nx\n");
    }

    #[test]
    fn test_malformed_include_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.wgsl"), "ok\n#include part.wgsl\n").unwrap();

        let result = preprocess(&dir.path().join("main.wgsl"));
        assert!(matches!(result, Err(LoadError::MalformedInclude { line: 2, .. })));
    }

    #[test]
    fn test_uniform_setters_reach_the_backend() {
        let (headless, shared) = HeadlessBackend::new_shared();
        let program = ShaderProgram::from_source(&shared, Path::new("inline"), "source").unwrap();
        let handle = program.handle().unwrap();

        program.set_float("environment.time", 2.5);
        program.set_int("lights_active", 4);
        assert_eq!(
            headless.lock().uniform(handle, "environment.time"),
            Some(UniformValue::Float(2.5))
        );
        assert_eq!(
            headless.lock().uniform(handle, "lights_active"),
            Some(UniformValue::Int(4))
        );

        drop(program);
        assert_eq!(headless.lock().live_programs(), 0);
    }

    #[test]
    fn test_failed_program_ignores_calls() {
        let (headless, shared) = HeadlessBackend::new_shared();
        let program = ShaderProgram::failed(&shared, Path::new("missing.wgsl"));
        program.enable();
        program.set_float("environment.time", 1.0);
        assert!(headless.lock().commands().is_empty());
    }
}
