//! # Repository Catalog Module / 仓库目录模块
//!
//! The catalog supplies, per repository, its canonical identity, reference
//! commit, setup recipe and test-harness description. It is loaded once from
//! a TOML file and consumed read-only; fetching the file from a remote index
//! is the job of an external collaborator.
//!
//! 目录按仓库提供其规范标识、参考提交、安装配方和测试框架描述。
//! 它从 TOML 文件加载一次并以只读方式使用；从远程索引获取该文件
//! 是外部协作方的职责。

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::infra::t;

/// Split selecting every repository in the catalog.
pub const SPLIT_ALL: &str = "all";

/// The ordered shell commands that turn a bare checkout into a ready
/// environment. The rendered script is what the fingerprint hashes.
/// 将裸检出变为就绪环境的有序 shell 命令。渲染后的脚本即指纹哈希的内容。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SetupRecipe {
    #[serde(default)]
    pub commands: Vec<String>,
}

/// How the repository's own test harness is invoked.
/// 如何调用仓库自身的测试框架。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TestHarnessSpec {
    /// Command template. `{tests}` is replaced with the shell-quoted test id
    /// selection (empty for a full run) and `{report}` with the path the
    /// machine-readable JSON report must be written to.
    /// 命令模板。`{tests}` 替换为经 shell 引用的测试 id 选择（完整运行时为空），
    /// `{report}` 替换为机器可读 JSON 报告必须写入的路径。
    pub command: String,

    /// Directory the full discovered test set lives under.
    /// 完整已发现测试集所在的目录。
    #[serde(default = "default_test_dir")]
    pub test_dir: String,

    /// Extra command fragment appended when coverage is requested.
    /// 请求覆盖率时附加的额外命令片段。
    #[serde(default)]
    pub coverage_flag: Option<String>,

    /// Known test identifiers, as recorded when the catalog was assembled.
    /// Serves `get-tests` without building an environment.
    /// 目录构建时记录的已知测试标识符。使 `get-tests` 无需构建环境。
    #[serde(default)]
    pub test_ids: Vec<String>,
}

/// One catalog entry. Immutable once the catalog is loaded.
/// 目录中的一条条目。目录加载后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepoSpec {
    pub name: String,
    /// Clone URL of the canonical repository.
    /// 规范仓库的克隆 URL。
    pub origin: String,
    /// The already-correct solution commit used as grading baseline and as
    /// the base for branch diffs.
    /// 作为评分基线和分支 diff 基准的正确解提交。
    pub reference_commit: String,
    /// Named subsets this repository belongs to.
    /// 此仓库所属的命名分组。
    #[serde(default)]
    pub splits: Vec<String>,
    pub setup: SetupRecipe,
    pub harness: TestHarnessSpec,
}

impl RepoSpec {
    /// Renders the full setup script the way it runs inside a fresh
    /// environment. Fingerprints hash exactly this text, so any recipe edit
    /// invalidates the cache.
    ///
    /// 按照在新环境中运行的方式渲染完整安装脚本。
    /// 指纹精确哈希此文本，因此任何配方修改都会使缓存失效。
    pub fn setup_script(&self) -> String {
        let mut lines = vec![
            "#!/bin/bash".to_string(),
            "set -euxo pipefail".to_string(),
            format!("# repository: {} @ {}", self.origin, self.reference_commit),
        ];
        lines.extend(self.setup.commands.iter().cloned());
        lines.join("\n") + "\n"
    }

    pub fn in_split(&self, split: &str) -> bool {
        split == SPLIT_ALL || self.splits.iter().any(|s| s == split)
    }
}

/// The loaded repository catalog.
/// 已加载的仓库目录。
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    repos: Vec<RepoSpec>,
}

impl Catalog {
    /// Loads and validates the catalog file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| {
            t!("catalog_read_failed", path = path.display()).to_string()
        })?;
        let catalog: Catalog =
            toml::from_str(&content).with_context(|| t!("catalog_parse_failed").to_string())?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for repo in &self.repos {
            if repo.name.is_empty() {
                bail!(t!("catalog_empty_name").to_string());
            }
            if !seen.insert(repo.name.as_str()) {
                bail!(t!("catalog_duplicate_repo", name = repo.name).to_string());
            }
            if repo.harness.command.is_empty() {
                bail!(t!("catalog_missing_command", name = repo.name).to_string());
            }
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&RepoSpec> {
        self.repos.iter().find(|r| r.name == name)
    }

    /// All repositories belonging to the given split, in catalog order.
    /// Unknown split names resolve to an error rather than an empty run.
    pub fn list(&self, split: &str) -> Result<Vec<&RepoSpec>> {
        let selected: Vec<&RepoSpec> =
            self.repos.iter().filter(|r| r.in_split(split)).collect();
        if selected.is_empty() {
            bail!(t!("catalog_unknown_split", split = split).to_string());
        }
        Ok(selected)
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    pub fn split_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .repos
            .iter()
            .flat_map(|r| r.splits.iter().cloned())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        names.sort();
        names
    }
}

fn default_test_dir() -> String {
    "tests/".to_string()
}
