use std::error::Error;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

use sprig_core::{
    create_context, deps, h, mount, Context, Document, DomError, EffectPhase, Element, Event,
    MemoryDocument, NodeId, Scope, Setter,
};
use sprig_runtime_std::StdRuntime;

#[derive(Clone, Debug, PartialEq)]
struct Todo {
    id: u32,
    text: String,
    done: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Filter {
    All,
    Active,
    Done,
}

impl Filter {
    const ALL: [Filter; 3] = [Filter::All, Filter::Active, Filter::Done];

    fn name(self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Active => "active",
            Filter::Done => "done",
        }
    }

    fn admits(self, todo: &Todo) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !todo.done,
            Filter::Done => todo.done,
        }
    }
}

thread_local! {
    static FILTER: Context<Filter> = create_context(Filter::All);
}

fn filter_context() -> Context<Filter> {
    FILTER.with(Clone::clone)
}

fn todo_item(cx: &mut Scope<'_>, props: &(Todo, Setter<Vec<Todo>>)) -> Element {
    let (todo, set_todos) = props;
    let filter = cx.read_context(&filter_context());
    if !filter.admits(todo) {
        return Element::empty();
    }
    let id = todo.id;
    let toggle = set_todos.clone();
    let remove = set_todos.clone();
    h::tag("li")
        .id(format!("todo-{id}"))
        .class(if todo.done { "done" } else { "active" })
        .child(h::tag("span").class("text").child(todo.text.as_str()))
        .child(
            h::tag("button")
                .class("toggle")
                .on("click", move |_| {
                    toggle.update(|todos| {
                        todos
                            .iter()
                            .map(|t| Todo {
                                done: if t.id == id { !t.done } else { t.done },
                                ..t.clone()
                            })
                            .collect()
                    })
                })
                .child("toggle"),
        )
        .child(
            h::tag("button")
                .class("remove")
                .on("click", move |_| {
                    remove.update(|todos| todos.iter().filter(|t| t.id != id).cloned().collect())
                })
                .child("remove"),
        )
        .into()
}

fn summary(cx: &mut Scope<'_>, todos: &Vec<Todo>) -> Element {
    let remaining = cx.use_memo(deps![todos.clone()], || {
        todos.iter().filter(|todo| !todo.done).count()
    });
    let noun = if remaining == 1 { "item" } else { "items" };
    h::tag("p")
        .class("summary")
        .child(format!("{remaining} {noun} left"))
        .into()
}

fn app(cx: &mut Scope<'_>, _: &()) -> Element {
    let (todos, set_todos) = cx.use_state(Vec::<Todo>::new);
    let (draft, set_draft) = cx.use_state(String::new);
    let (filter, set_filter) = cx.use_state(|| Filter::All);
    let next_id = cx.use_ref(|| 1u32);
    cx.write_context(&filter_context(), filter);

    let count = todos.len();
    cx.use_effect(EffectPhase::AfterRender, deps![count], move || {
        log::debug!("todo list now holds {count} item(s)");
    });

    let add = {
        let (todos, draft, set_todos, set_draft) =
            (todos.clone(), draft.clone(), set_todos.clone(), set_draft.clone());
        move |_: &Event| {
            let text = draft.trim();
            if text.is_empty() {
                log::warn!("ignoring empty todo");
                return;
            }
            let id = next_id.update(|next| {
                *next += 1;
                *next - 1
            });
            let mut next = todos.clone();
            next.push(Todo {
                id,
                text: text.to_string(),
                done: false,
            });
            set_todos.set(next);
            set_draft.set(String::new());
        }
    };

    h::tag("section")
        .class("todo-app")
        .child(
            h::tag("input")
                .id("draft")
                .prop("placeholder", "What needs doing?")
                .prop("value", draft.as_str())
                .on("input", move |event| {
                    set_draft.set(event.value.clone().unwrap_or_default())
                }),
        )
        .child(h::tag("button").id("add").on("click", add).child("Add"))
        .child(
            h::tag("ul").children(
                todos
                    .iter()
                    .map(|todo| h::component(todo_item, (todo.clone(), set_todos.clone())).key(&todo.id)),
            ),
        )
        .child(h::tag("nav").children(Filter::ALL.iter().map(|&option| {
            let set_filter = set_filter.clone();
            h::tag("button")
                .id(format!("filter-{}", option.name()))
                .prop("disabled", option == filter)
                .on("click", move |_| set_filter.set(option))
                .child(option.name())
        })))
        .child(h::component(summary, todos.clone()))
        .into()
}

struct Session {
    document: Rc<MemoryDocument>,
    runtime: StdRuntime,
    container: NodeId,
}

impl Session {
    fn find(&self, selector: &str) -> Result<NodeId, DomError> {
        self.document
            .query_selector(selector)
            .ok_or_else(|| DomError::NoMatch(selector.to_string()))
    }

    fn click(&self, selector: &str) -> Result<(), DomError> {
        self.document.click(self.find(selector)?)
    }

    fn flush(&self) -> Result<(), Box<dyn Error>> {
        let ran = self.runtime.run_pending()?;
        log::trace!("ran {ran} flush task(s)");
        Ok(())
    }

    /// Applies one command. Returns `false` when the session should end.
    fn execute(&self, command: &str, argument: &str) -> Result<bool, Box<dyn Error>> {
        match command {
            "add" => {
                self.document.set_value(self.find("#draft")?, argument)?;
                self.flush()?;
                self.click("#add")?;
            }
            "toggle" | "remove" => self.click(&format!("#todo-{argument} .{command}"))?,
            "filter" => self.click(&format!("#filter-{argument}"))?,
            "html" => {
                println!("{}", self.document.outer_html(self.container));
                return Ok(true);
            }
            "help" => {
                print_help();
                return Ok(true);
            }
            "quit" | "exit" => return Ok(false),
            "" => return Ok(true),
            other => {
                println!("unknown command `{other}`; try `help`");
                return Ok(true);
            }
        }
        self.flush()?;
        self.print();
        Ok(true)
    }

    fn print(&self) {
        let document = &self.document;
        for item in document.query_selector_all(".todo-app li") {
            let done = document.attribute(item, "class").as_deref() == Some("done");
            let id = document
                .attribute(item, "id")
                .and_then(|id| id.strip_prefix("todo-").map(str::to_string))
                .unwrap_or_default();
            let text = document
                .children(item)
                .first()
                .map(|&span| document.text_content(span))
                .unwrap_or_default();
            println!("  [{}] {id}: {text}", if done { "x" } else { " " });
        }
        if let Ok(summary) = self.find(".summary") {
            println!("  {}", document.text_content(summary));
        }
    }
}

fn print_help() {
    println!("commands:");
    println!("  add <text>       add a todo");
    println!("  toggle <id>      mark a todo done or active");
    println!("  remove <id>      delete a todo");
    println!("  filter <name>    show all, active or done todos");
    println!("  html             dump the rendered markup");
    println!("  quit");
}

fn run() -> Result<(), Box<dyn Error>> {
    let document = Rc::new(MemoryDocument::new());
    let container = document.create_element("div")?;
    document.set_attribute(container, "id", "app")?;
    document.append_child(document.body(), container)?;

    let runtime = StdRuntime::new();
    let _mount = mount(
        h::component(app, ()),
        "#app",
        document.clone(),
        runtime.runtime(),
    )?;
    let session = Session {
        document,
        runtime,
        container,
    };

    println!("=== Sprig Todo Example ===");
    print_help();
    session.print();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        let (command, argument) = line.split_once(' ').unwrap_or((line, ""));
        match session.execute(command, argument.trim()) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => println!("error: {err}"),
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        log::error!("todo demo failed: {err}");
        std::process::exit(1);
    }
}
