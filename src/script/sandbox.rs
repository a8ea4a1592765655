//! QuickJS 脚本沙箱
//!
//! 每次调用都创建新的 Runtime 和 Context，全局作用域只包含：
//!
//! - `client.log / test / assert`
//! - `client.global.get / set / clear / clearAll`
//! - `request.variables.get / set`（仅请求前脚本）
//! - `response`（仅响应后脚本，深度冻结）
//! - `jsonPath(value, expr)`
//!
//! QuickJS 本身不带文件、进程、网络、模块加载和定时器，
//! 引用 `require`、`process`、`fetch` 等都会得到 ReferenceError。

use crate::script::types::{SandboxExecutionResult, ScriptGlobals, SubTestResult};
use crate::utils::jsonpath;
use crate::variable::response::NamedResponseRecord;
use crate::variable::types::SandboxSettings;
use rquickjs::convert::Coerced;
use rquickjs::function::{Opt, Rest, This};
use rquickjs::runtime::RejectionTracker;
use rquickjs::{
    CatchResultExt, CaughtError, Context, Ctx, Exception, FromJs, Function, Object, Runtime, Value,
};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const DEEP_FREEZE: &str = r#"(function deepFreeze(target) {
    Object.getOwnPropertyNames(target).forEach(function (key) {
        var value = target[key];
        if (value !== null && typeof value === "object") {
            deepFreeze(value);
        }
    });
    return Object.freeze(target);
})"#;

/// 调用期间由各个 JS 函数共享的状态
#[derive(Debug, Default)]
struct Invocation {
    logs: Vec<String>,
    tests: Vec<SubTestResult>,
    globals: ScriptGlobals,
    /// 请求前脚本可见的变量（含本次写入）
    variables: BTreeMap<String, String>,
    writes: BTreeMap<String, String>,
    /// 尚未处理的 Promise 拒绝数
    unhandled: usize,
    rejection: Option<String>,
}

/// 脚本可见的请求/响应对象
enum Surface<'a> {
    PreRequest(&'a BTreeMap<String, String>),
    PostResponse(&'a NamedResponseRecord),
}

/// 脚本执行器
#[derive(Debug, Clone)]
pub struct ScriptSandbox {
    timeout: Duration,
    memory_limit: usize,
}

impl Default for ScriptSandbox {
    fn default() -> Self {
        Self::new(&SandboxSettings::default())
    }
}

impl ScriptSandbox {
    pub fn new(settings: &SandboxSettings) -> Self {
        Self {
            timeout: Duration::from_millis(settings.timeout_ms),
            memory_limit: settings.memory_limit_mb.saturating_mul(1024 * 1024),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 请求前脚本：可以读写 `request.variables`
    pub fn run_pre_request(
        &self,
        source: &str,
        globals: &mut ScriptGlobals,
        variables: &BTreeMap<String, String>,
    ) -> SandboxExecutionResult {
        self.run(source, globals, Surface::PreRequest(variables))
    }

    /// 响应后脚本：可以读取冻结的 `response`
    pub fn run_post_response(
        &self,
        source: &str,
        globals: &mut ScriptGlobals,
        response: &NamedResponseRecord,
    ) -> SandboxExecutionResult {
        self.run(source, globals, Surface::PostResponse(response))
    }

    fn run(
        &self,
        source: &str,
        globals: &mut ScriptGlobals,
        surface: Surface<'_>,
    ) -> SandboxExecutionResult {
        let variables = match &surface {
            Surface::PreRequest(vars) => (*vars).clone(),
            Surface::PostResponse(_) => BTreeMap::new(),
        };
        let state = Rc::new(RefCell::new(Invocation {
            globals: globals.clone(),
            variables,
            ..Invocation::default()
        }));
        let timed_out = Arc::new(AtomicBool::new(false));

        let outcome = self.evaluate(source, &state, &timed_out, &surface);

        let mut invocation = state.take();
        // 全局存储的写入无论成败都保留
        *globals = std::mem::take(&mut invocation.globals);

        match outcome {
            Ok(()) => {
                debug!(
                    "Script completed: {} log(s), {} sub-test(s)",
                    invocation.logs.len(),
                    invocation.tests.len()
                );
                SandboxExecutionResult {
                    success: true,
                    logs: invocation.logs,
                    tests: invocation.tests,
                    failure: None,
                    variable_writes: invocation.writes,
                }
            }
            Err(detail) => {
                let detail = if timed_out.load(Ordering::SeqCst) {
                    format!("script timed out after {} ms", self.timeout.as_millis())
                } else {
                    detail
                };
                warn!("Script failed: {}", detail);
                SandboxExecutionResult {
                    success: false,
                    logs: invocation.logs,
                    tests: invocation.tests,
                    failure: Some(detail),
                    variable_writes: BTreeMap::new(),
                }
            }
        }
    }

    fn evaluate(
        &self,
        source: &str,
        state: &Rc<RefCell<Invocation>>,
        timed_out: &Arc<AtomicBool>,
        surface: &Surface<'_>,
    ) -> Result<(), String> {
        let runtime =
            Runtime::new().map_err(|e| format!("failed to create script runtime: {}", e))?;
        runtime.set_memory_limit(self.memory_limit);

        let deadline = Instant::now() + self.timeout;
        let flag = Arc::clone(timed_out);
        runtime.set_interrupt_handler(Some(Box::new(move || {
            if Instant::now() >= deadline {
                flag.store(true, Ordering::SeqCst);
                true
            } else {
                false
            }
        })));

        let rejections = Rc::clone(state);
        let tracker: RejectionTracker = Box::new(move |ctx, _promise, reason, is_handled| {
            if is_handled {
                let mut invocation = rejections.borrow_mut();
                invocation.unhandled = invocation.unhandled.saturating_sub(1);
                return;
            }
            let reason = describe_reason(&ctx, reason);
            let mut invocation = rejections.borrow_mut();
            invocation.unhandled += 1;
            invocation.rejection.get_or_insert(reason);
        });
        runtime.set_host_promise_rejection_tracker(Some(tracker));

        let context = Context::full(&runtime)
            .map_err(|e| format!("failed to create script context: {}", e))?;

        context.with(|ctx| {
            install_globals(&ctx, state, timed_out, surface)
                .map_err(|e| format!("failed to install script globals: {}", e))?;
            ctx.eval::<Value, _>(source)
                .catch(&ctx)
                .map(|_| ())
                .map_err(describe)
        })?;

        loop {
            match runtime.execute_pending_job() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(_) => return Err("uncaught error in promise job".to_string()),
            }
        }

        let invocation = state.borrow();
        if invocation.unhandled > 0 {
            return Err(format!(
                "unhandled promise rejection: {}",
                invocation.rejection.as_deref().unwrap_or("unknown reason")
            ));
        }

        Ok(())
    }
}

fn describe(caught: CaughtError<'_>) -> String {
    match caught {
        CaughtError::Exception(exception) => {
            let message = exception.message().unwrap_or_default();
            match exception.as_object().get::<_, Coerced<String>>("name") {
                Ok(Coerced(name)) if !name.is_empty() => format!("{}: {}", name, message),
                _ => message,
            }
        }
        other => other.to_string(),
    }
}

fn describe_reason<'js>(ctx: &Ctx<'js>, reason: Value<'js>) -> String {
    if let Some(exception) = reason.as_exception() {
        return describe(CaughtError::Exception(exception.clone()));
    }
    render_value(ctx, reason).unwrap_or_else(|_| "promise rejected".to_string())
}

/// 异步子测试返回 Promise 时，驱动任务队列直到它落定
fn settle<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<Value<'js>> {
    let Some(promise) = value.as_promise().cloned() else {
        return Ok(value);
    };

    // 挂上处理函数，拒绝由子测试自己记录
    let ignore = Function::new(ctx.clone(), || {})?;
    promise
        .catch()?
        .call::<_, Value<'js>>((This(promise.clone()), ignore))?;

    match promise.finish::<Value<'js>>() {
        Err(rquickjs::Error::WouldBlock) => Err(Exception::throw_message(
            ctx,
            "async test did not settle",
        )),
        other => other,
    }
}

/// 把 JS 值转为文本：字符串原样，其余尽量输出 JSON
fn render_value<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<String> {
    if let Some(text) = value.as_string() {
        return text.to_string();
    }
    if value.is_undefined() {
        return Ok("undefined".to_string());
    }
    if !value.is_function() {
        if let Some(json) = ctx.json_stringify(value.clone())? {
            return json.to_string();
        }
    }
    Ok(Coerced::<String>::from_js(ctx, value)?.0)
}

fn install_globals<'js>(
    ctx: &Ctx<'js>,
    state: &Rc<RefCell<Invocation>>,
    timed_out: &Arc<AtomicBool>,
    surface: &Surface<'_>,
) -> rquickjs::Result<()> {
    let globals = ctx.globals();
    globals.set("client", build_client(ctx, state, timed_out)?)?;
    globals.set(
        "jsonPath",
        Function::new(
            ctx.clone(),
            |ctx: Ctx<'js>, value: Value<'js>, expr: Coerced<String>| {
                json_path(&ctx, value, &expr.0)
            },
        )?,
    )?;

    match surface {
        Surface::PreRequest(_) => globals.set("request", build_request(ctx, state)?)?,
        Surface::PostResponse(record) => globals.set("response", build_response(ctx, record)?)?,
    }

    Ok(())
}

fn build_client<'js>(
    ctx: &Ctx<'js>,
    state: &Rc<RefCell<Invocation>>,
    timed_out: &Arc<AtomicBool>,
) -> rquickjs::Result<Object<'js>> {
    let client = Object::new(ctx.clone())?;

    let logs = Rc::clone(state);
    client.set(
        "log",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<()> {
                let parts = args
                    .0
                    .into_iter()
                    .map(|v| render_value(&ctx, v))
                    .collect::<rquickjs::Result<Vec<_>>>()?;
                let line = parts.join(" ");
                info!(target: "restflow::script", "{}", line);
                logs.borrow_mut().logs.push(line);
                Ok(())
            },
        )?,
    )?;

    let tests = Rc::clone(state);
    let interrupted = Arc::clone(timed_out);
    client.set(
        "test",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, name: Coerced<String>, body: Function<'js>| -> rquickjs::Result<()> {
                let outcome = body
                    .call::<_, Value<'js>>(())
                    .and_then(|value| settle(&ctx, value));
                // 超时必须继续向外传播，不能被记成子测试失败
                if outcome.is_err() && interrupted.load(Ordering::SeqCst) {
                    return outcome.map(|_| ());
                }
                let (passed, detail) = match outcome.catch(&ctx) {
                    Ok(_) => (true, None),
                    Err(caught) => (false, Some(describe(caught))),
                };
                debug!("Sub-test '{}' passed={}", name.0, passed);
                tests.borrow_mut().tests.push(SubTestResult {
                    name: name.0,
                    passed,
                    detail,
                });
                Ok(())
            },
        )?,
    )?;

    client.set(
        "assert",
        Function::new(
            ctx.clone(),
            |ctx: Ctx<'js>, condition: Coerced<bool>, message: Opt<Coerced<String>>| -> rquickjs::Result<()> {
                if condition.0 {
                    return Ok(());
                }
                let message = message
                    .0
                    .map(|m| m.0)
                    .unwrap_or_else(|| "Assertion failed".to_string());
                Err(Exception::throw_message(&ctx, &message))
            },
        )?,
    )?;

    client.set("global", build_global_store(ctx, state)?)?;

    Ok(client)
}

fn build_global_store<'js>(
    ctx: &Ctx<'js>,
    state: &Rc<RefCell<Invocation>>,
) -> rquickjs::Result<Object<'js>> {
    let global = Object::new(ctx.clone())?;

    let reader = Rc::clone(state);
    global.set(
        "get",
        Function::new(ctx.clone(), move |name: Coerced<String>| {
            reader.borrow().globals.get(&name.0).map(str::to_string)
        })?,
    )?;

    let writer = Rc::clone(state);
    global.set(
        "set",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, name: Coerced<String>, value: Value<'js>| -> rquickjs::Result<()> {
                let value = render_value(&ctx, value)?;
                writer.borrow_mut().globals.set(name.0, value);
                Ok(())
            },
        )?,
    )?;

    let remover = Rc::clone(state);
    global.set(
        "clear",
        Function::new(ctx.clone(), move |name: Coerced<String>| {
            remover.borrow_mut().globals.remove(&name.0);
        })?,
    )?;

    let clearer = Rc::clone(state);
    global.set(
        "clearAll",
        Function::new(ctx.clone(), move || {
            clearer.borrow_mut().globals.clear();
        })?,
    )?;

    Ok(global)
}

fn build_request<'js>(
    ctx: &Ctx<'js>,
    state: &Rc<RefCell<Invocation>>,
) -> rquickjs::Result<Object<'js>> {
    let request = Object::new(ctx.clone())?;
    let variables = Object::new(ctx.clone())?;

    let reader = Rc::clone(state);
    variables.set(
        "get",
        Function::new(ctx.clone(), move |name: Coerced<String>| {
            reader.borrow().variables.get(&name.0).cloned()
        })?,
    )?;

    let writer = Rc::clone(state);
    variables.set(
        "set",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, name: Coerced<String>, value: Value<'js>| -> rquickjs::Result<()> {
                let value = render_value(&ctx, value)?;
                let mut invocation = writer.borrow_mut();
                invocation.variables.insert(name.0.clone(), value.clone());
                invocation.writes.insert(name.0, value);
                Ok(())
            },
        )?,
    )?;

    request.set("variables", variables)?;
    Ok(request)
}

fn build_response<'js>(
    ctx: &Ctx<'js>,
    record: &NamedResponseRecord,
) -> rquickjs::Result<Object<'js>> {
    let (mime_type, charset) = record.content_type().unwrap_or_default();
    let snapshot = serde_json::json!({
        "status": record.status,
        "statusText": record.status_text,
        "headers": record.headers_json(),
        "body": record.body.to_value(),
        "contentType": {
            "mimeType": mime_type,
            "charset": charset,
        },
    });

    let response = Object::from_js(ctx, ctx.json_parse(snapshot.to_string())?)?;
    let headers: Object<'js> = response.get("headers")?;

    let single = record.headers.clone();
    headers.set(
        "valueOf",
        Function::new(ctx.clone(), move |name: Coerced<String>| {
            single
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(&name.0))
                .map(|(_, v)| v.clone())
        })?,
    )?;

    let all = record.headers.clone();
    headers.set(
        "valuesOf",
        Function::new(ctx.clone(), move |name: Coerced<String>| {
            all.iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case(&name.0))
                .map(|(_, v)| v.clone())
                .collect::<Vec<String>>()
        })?,
    )?;

    let freeze: Function<'js> = ctx.eval(DEEP_FREEZE)?;
    freeze.call::<_, Value<'js>>((response.clone(),))?;

    Ok(response)
}

fn json_path<'js>(ctx: &Ctx<'js>, value: Value<'js>, expr: &str) -> rquickjs::Result<Value<'js>> {
    let json = if let Some(text) = value.as_string() {
        let text = text.to_string()?;
        serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
    } else {
        match ctx.json_stringify(value)? {
            Some(text) => serde_json::from_str(&text.to_string()?)
                .map_err(|e| Exception::throw_message(ctx, &e.to_string()))?,
            None => return Ok(Value::new_undefined(ctx.clone())),
        }
    };

    match jsonpath::first(&json, expr) {
        Some(found) => ctx.json_parse(found.to_string()),
        None => Ok(Value::new_undefined(ctx.clone())),
    }
}
