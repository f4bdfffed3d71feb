//! Investica 命令行入口
//!
//! 同步 REPL：主线程阻塞读取输入，每轮通过执行桥交给后台运行时处理。
//! 用法：`investica [config.toml]`

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use investica::{observability, Assistant};
use uuid::Uuid;

const HELP: &str = "Commands:
  help     show this help
  history  print the current conversation
  clear    start a new conversation
  quit     exit (also: exit)";

fn main() -> anyhow::Result<()> {
    observability::init();

    // Prompt 覆盖目录
    let _ = std::fs::create_dir_all("config/prompts");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let assistant =
        Assistant::from_config_path(config_path).context("Failed to create assistant")?;

    let mut conversation_id = Uuid::new_v4().to_string();
    println!("Investica - type 'help' for commands");
    println!("Conversation: {conversation_id}");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        print!("> ");
        stdout.flush().context("Failed to flush stdout")?;

        line.clear();
        if stdin.lock().read_line(&mut line).context("Failed to read input")? == 0 {
            break;
        }
        let input = line.trim();

        match input {
            "quit" | "exit" => break,
            "help" => println!("{HELP}"),
            "clear" => {
                conversation_id = Uuid::new_v4().to_string();
                println!("Started a new conversation: {conversation_id}");
            }
            "history" => match assistant.history(&conversation_id) {
                Ok(messages) if messages.is_empty() => println!("(empty)"),
                Ok(messages) => {
                    for m in messages {
                        println!("[{}] {}", m.role.as_str(), m.content);
                    }
                }
                Err(e) => println!("{}", e.user_message()),
            },
            _ => println!("{}", assistant.reply(&conversation_id, input)),
        }
    }

    assistant.shutdown();
    println!("Goodbye!");
    Ok(())
}
