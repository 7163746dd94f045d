//! Some utility functions

use minidom::Element;

use crate::error::StoreError;
use crate::store::TaskStore;
use crate::task::TaskData;

/// Walks an XML tree and returns every element that has the given name
pub fn find_elems<S: AsRef<str>>(root: &Element, searched_name: S) -> Vec<&Element> {
    let searched_name = searched_name.as_ref();
    let mut elems: Vec<&Element> = Vec::new();

    for el in root.children() {
        if el.name() == searched_name {
            elems.push(el);
        } else {
            let ret = find_elems(el, searched_name);
            elems.extend(ret);
        }
    }
    elems
}

/// Walks an XML tree until it finds an elements with the given name
pub fn find_elem<S: AsRef<str>>(root: &Element, searched_name: S) -> Option<&Element> {
    let searched_name = searched_name.as_ref();
    if root.name() == searched_name {
        return Some(root);
    }

    for el in root.children() {
        if el.name() == searched_name {
            return Some(el);
        } else {
            let ret = find_elem(el, searched_name);
            if ret.is_some() {
                return ret;
            }
        }
    }
    None
}

/// Escape a string so that it can be inserted in an XML text node
pub fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}


/// A debug utility that pretty-prints every list of a store, and their tasks as a tree
pub fn print_lists(store: &TaskStore) -> Result<(), StoreError> {
    for list in store.get_lists()? {
        let status = if list.deleted { "x" } else if list.synced { "=" } else { "~" };
        println!("LIST {} {} ({})", status, list.name, list.uid);
        let tasks = store.get_tasks(Some(&list.uid), None)?;
        print_subtree(&tasks, "", 1);
    }
    Ok(())
}

fn print_subtree(tasks: &[TaskData], parent: &str, depth: usize) {
    for task in tasks.iter().filter(|t| t.parent == parent) {
        print_task(task, depth);
        print_subtree(tasks, &task.uid, depth + 1);
    }
}

pub fn print_task(task: &TaskData, depth: usize) {
    let completion = if task.completed { "✓" } else { " " };
    let sync = match (task.deleted, task.synced) {
        (true, _) => "x",
        (false, true) => "=",
        (false, false) => "~",
    };
    println!("{}{}{} {}\t{}", "    ".repeat(depth), completion, sync, task.text, task.uid);
}
