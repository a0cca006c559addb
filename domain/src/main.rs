use std::env;
use std::process;

use domain::adapters::memory_repo::InMemoryRepo;
use domain::service::UserService;
use domain::{CoreError, UserId, UserRecord};

fn print_usage() {
    eprintln!(
        "{}\n\nUsage:\n  domain add <name> <email> [<name> <email> ...]\n  domain get <id>\n\nNotes:\n  - This demo CLI uses an in-memory repository; data is not persisted across runs.\n  - `add` lists the collection after inserting.",
        domain::about()
    );
}

fn run() -> Result<(), String> {
    let mut args = env::args().skip(1); // skip program name

    let Some(cmd) = args.next() else {
        print_usage();
        return Ok(());
    };

    let svc = UserService::new(InMemoryRepo::new());

    match cmd.as_str() {
        "add" => {
            let rest: Vec<String> = args.collect();
            if rest.is_empty() || rest.len() % 2 != 0 {
                return Err("add expects <name> <email> pairs".into());
            }
            for pair in rest.chunks(2) {
                let user = svc
                    .add(UserRecord::new(pair[0].clone(), pair[1].clone()))
                    .map_err(|e| format!("add failed: {}", e))?;
                println!("created: {} -> {} <{}>", user.id, user.record.name, user.record.email);
            }
            let listing = svc.list();
            println!("collection holds {} user(s)", listing.users.len());
            if let Some(e) = listing.interrupted {
                return Err(format!("listing interrupted: {}", e));
            }
            Ok(())
        }
        "get" => {
            let Some(raw) = args.next() else {
                return Err("missing <id> for get".into());
            };
            let id = UserId::new(raw).map_err(|e| format!("invalid id: {}", e))?;
            match svc.get(&id) {
                Ok(record) => {
                    println!("{} <{}>", record.name, record.email);
                    Ok(())
                }
                Err(CoreError::NotFound) => Err("not found".into()),
                Err(e) => Err(format!("get failed: {}", e)),
            }
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn main() {
    if let Err(msg) = run() {
        eprintln!("error: {}", msg);
        process::exit(1);
    }
}
