//! 工具种类注册表
//!
//! 把工具种类名映射到启动命令行。默认种类对应容器化的 MCP 工具
//! 服务（浏览器自动化、网页抓取）；测试可以注册任意本地命令。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use workhub_core::config::ToolSettings;

/// 一个工具种类的启动配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolKindSpec {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
}

impl ToolKindSpec {
    pub fn new(name: &str, command: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// 工具种类注册表
#[derive(Debug, Clone, Default)]
pub struct ToolKindRegistry {
    kinds: HashMap<String, ToolKindSpec>,
}

impl ToolKindRegistry {
    /// 空注册表（测试用）
    pub fn empty() -> Self {
        Self::default()
    }

    /// 带默认工具种类的注册表
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register(ToolKindSpec::new(
            "playwright",
            "docker",
            &["run", "-i", "--rm", "mcp/playwright"],
        ));
        registry.register(ToolKindSpec::new(
            "fetch",
            "docker",
            &["run", "-i", "--rm", "mcp/fetch"],
        ));
        registry
    }

    /// 从配置构建：默认种类加上配置中的覆盖项
    ///
    /// 覆盖项的值是完整命令行（第一个元素是命令，其余是参数）。
    pub fn from_settings(settings: &ToolSettings) -> Self {
        let mut registry = Self::with_defaults();
        for (name, cmdline) in &settings.kind_overrides {
            if let Some((command, args)) = cmdline.split_first() {
                registry.register(ToolKindSpec {
                    name: name.clone(),
                    command: command.clone(),
                    args: args.to_vec(),
                });
            }
        }
        registry
    }

    pub fn register(&mut self, spec: ToolKindSpec) {
        self.kinds.insert(spec.name.clone(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&ToolKindSpec> {
        self.kinds.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.kinds.keys().cloned().collect();
        names.sort();
        names
    }
}
