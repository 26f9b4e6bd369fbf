//! 嵌入的执行壳脚本
//!
//! 通过 `node -e` 运行：从 stdin 读入用户代码，在一个裸 `node:vm`
//! 上下文中执行。上下文只暴露 console 原语和计时器，不提供
//! require/process/宿主文件系统。每次 console 调用立即输出一行
//! JSON（流式），最后输出一行 result 或 error 终止行。
//!
//! `__TIMEOUT_MS__` 在启动前由执行器替换，作为同步紧循环的
//! vm 级第二道超时（墙钟超时由 Rust 侧强杀兜底）。

pub(crate) const JS_HARNESS: &str = r#"'use strict';
const vm = require('node:vm');

function emit(obj) {
    process.stdout.write(JSON.stringify(obj) + '\n');
}

function render(value) {
    if (value === null || value === undefined) return null;
    if (typeof value === 'object' || Array.isArray(value)) {
        try { return JSON.stringify(value); } catch (_) { return String(value); }
    }
    return String(value);
}

function consoleLine(args) {
    emit({ type: 'console', output: args.map((a) => {
        const rendered = render(a);
        return rendered === null ? String(a) : rendered;
    }).join(' ') });
}

const chunks = [];
process.stdin.on('data', (c) => chunks.push(c));
process.stdin.on('end', () => {
    const source = Buffer.concat(chunks).toString('utf8');
    const sandboxConsole = {
        log: (...args) => consoleLine(args),
        info: (...args) => consoleLine(args),
        warn: (...args) => consoleLine(args),
        error: (...args) => consoleLine(args),
    };
    const context = vm.createContext({
        console: sandboxConsole,
        setTimeout, setInterval, clearTimeout, clearInterval, queueMicrotask,
    });
    let value;
    try {
        value = vm.runInContext(source, context, {
            filename: '<execute>',
            timeout: __TIMEOUT_MS__,
        });
    } catch (e) {
        emit({ type: 'error', message: e && e.message ? String(e.message) : String(e) });
        process.exit(0);
    }
    emit({ type: 'result', value: render(value) });
    process.exit(0);
});
"#;
