use std::time::Duration;
use treehouse_core::{Backend, Node, Path, Workbench, WorkspaceConfig};

fn setup() -> (Workbench, Path) {
    let config = WorkspaceConfig {
        debounce: Duration::from_secs(60),
        ..WorkspaceConfig::default()
    };
    let workbench = Workbench::new(Backend::in_memory(), config).unwrap();
    let main = workbench.load().unwrap();
    (workbench, main)
}

fn typed_row(workbench: &Workbench, after: &Path, name: &str) -> Path {
    let row = workbench.new_node_after(after).unwrap();
    row.node().set_name(name).unwrap();
    row
}

fn walk_down(workbench: &Workbench, start: &Path) -> Vec<String> {
    let mut rows = Vec::new();
    let mut cursor = workbench.cursor_down(start).unwrap();
    while let Some(path) = cursor {
        let depth = "  ".repeat(path.len() - 2);
        rows.push(format!("{depth}{}", path.node().name().unwrap()));
        cursor = workbench.cursor_down(&path).unwrap();
    }
    rows
}

fn walk_up(workbench: &Workbench, start: &Path) -> Vec<String> {
    let mut rows = vec![start.node().name().unwrap()];
    let mut cursor = workbench.cursor_up(start).unwrap();
    while let Some(path) = cursor {
        rows.push(path.node().name().unwrap());
        cursor = workbench.cursor_up(&path).unwrap();
    }
    rows
}

#[test]
fn typing_an_outline_with_enter_and_tab() {
    let (workbench, main) = setup();

    let groceries = typed_row(&workbench, &main, "Groceries");
    let milk = typed_row(&workbench, &groceries, "Milk");
    let milk = workbench.indent(&milk).unwrap().expect("milk indents");
    let eggs = typed_row(&workbench, &milk, "Eggs");
    let eggs_out = workbench.outdent(&eggs).unwrap().expect("eggs outdents");
    eggs_out.node().set_name("Chores").unwrap();

    assert_eq!(
        walk_down(&workbench, &main),
        vec!["Groceries", "  Milk", "Chores"]
    );

    workbench.set_expanded(&groceries, false).unwrap();
    assert_eq!(walk_down(&workbench, &main), vec!["Groceries", "Chores"]);
}

#[test]
fn cursor_up_retraces_cursor_down() {
    let (workbench, main) = setup();
    let a = typed_row(&workbench, &main, "A");
    let b = typed_row(&workbench, &a, "B");
    let b1 = typed_row(&workbench, &b, "B1");
    typed_row(&workbench, &b1, "C");
    workbench.indent(&b1).unwrap().expect("B1 indents under B");

    let mut last = main.clone();
    while let Some(next) = workbench.cursor_down(&last).unwrap() {
        last = next;
    }

    assert_eq!(last.node().name().unwrap(), "C");
    assert_eq!(walk_up(&workbench, &last), vec!["C", "B1", "B", "A"]);
}

#[test]
fn side_panel_shows_same_node_under_its_own_expansion() {
    let (workbench, main) = setup();
    let project = typed_row(&workbench, &main, "Project");
    let task = typed_row(&workbench, &project, "Task");
    workbench.indent(&task).unwrap().expect("task indents");

    let side = workbench.open_new_panel(project.node());
    assert_eq!(
        workbench.cursor_down(&side).unwrap().map(|path| path.node().clone()),
        Some(task.node().clone())
    );

    // Main panel keeps its own flag for the same node.
    workbench.set_expanded(&project, false).unwrap();
    assert!(!workbench.is_expanded(&project));
    assert!(workbench.is_expanded(&side));
    assert_ne!(
        workbench.cursor_down(&project).unwrap().map(|path| path.key()),
        Some(side.sub(task.node().clone()).key())
    );
}

#[test]
fn reference_rows_expand_into_target_children() {
    let (workbench, main) = setup();
    let inbox = typed_row(&workbench, &main, "Inbox");
    let archive = typed_row(&workbench, &inbox, "Archive");
    let item = typed_row(&workbench, &inbox, "Item");
    let item = workbench.indent(&item).unwrap().expect("item indents");

    workbench.copy(&inbox);
    let alias = workbench
        .paste_reference(&archive)
        .unwrap()
        .expect("clipboard filled");
    workbench.set_expanded(&alias, true).unwrap();

    let below = workbench
        .cursor_down(&alias)
        .unwrap()
        .expect("alias shows target children");
    assert_eq!(below.node().name().unwrap(), "Item");
    assert_eq!(below.previous(), Some(alias.node()));
    assert_ne!(below.key(), item.key());

    let names = |node: &Node| node.name().unwrap();
    assert_eq!(names(alias.node()), "Inbox");
}
