use chrono::{Duration, Utc};
use rand::Rng;
use uuid::Uuid;

const NUM_USERS: usize = 6;
const NUM_ADMINS: usize = 2;

const NUM_POSTS: usize = 20;
const COMMENTS_PER_POST: usize = 15;
const COMMENT_WORD_COUNT: usize = 30;

const ROLES: &[&str] = &["Captain", "First Officer", "Purser", "Cabin Crew"];

fn gen_n_items(table: &str, n: usize, mut f: impl FnMut(usize) -> String) {
    println!("INSERT INTO {} VALUES", table);
    for i in 0..n {
        if i != 0 {
            println!(",");
        }
        print!("    {}", f(i));
    }
    println!();
    println!("ON CONFLICT DO NOTHING;");
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn main() {
    let mut rng = rand::thread_rng();
    let now = Utc::now();

    // Generate users, the first ones being admins
    let mut users = Vec::new();
    gen_n_items("users", NUM_USERS, |i| {
        let uuid = Uuid::new_v4();
        let kind = match i < NUM_ADMINS {
            true => "admin",
            false => "submitter",
        };
        let name = lipsum::lipsum_words(2);
        let role = ROLES[rng.gen_range(0..ROLES.len())];
        users.push((uuid, name.clone(), String::from(role), kind));
        format!("('{uuid}', {}, {}, '{kind}')", quote(&name), quote(role))
    });

    // One session per user, so that the tokens can be used right away
    gen_n_items("sessions", users.len(), |i| {
        let token = Uuid::new_v4();
        println!("-- token of {} ({}): {token}", users[i].1, users[i].3);
        format!("('{token}', '{}', '{}')", users[i].0, now.to_rfc3339())
    });

    // Generate posts, authored by submitters
    let mut posts = Vec::new();
    gen_n_items("posts", NUM_POSTS, |_| {
        let uuid = Uuid::new_v4();
        let author = users[rng.gen_range(NUM_ADMINS..users.len())].0;
        posts.push(uuid);
        format!(
            "('{uuid}', '{author}', {}, {})",
            quote(&lipsum::lipsum_title()),
            rng.gen_bool(0.3),
        )
    });

    // Generate comments; parents always come before their replies
    let mut thread: Vec<Uuid> = Vec::new();
    gen_n_items("comments", NUM_POSTS * COMMENTS_PER_POST, |i| {
        let post = posts[i / COMMENTS_PER_POST];
        if i % COMMENTS_PER_POST == 0 {
            thread.clear();
        }
        let uuid = Uuid::new_v4();
        let parent = match thread.is_empty() || rng.gen_bool(0.4) {
            true => String::from("NULL"),
            false => format!("'{}'", thread[rng.gen_range(0..thread.len())]),
        };
        thread.push(uuid);
        let (author, name, role, kind) = &users[rng.gen_range(0..users.len())];
        let created_at = now - Duration::minutes((COMMENTS_PER_POST - i % COMMENTS_PER_POST) as i64 * 30);
        let updated_at = match rng.gen_bool(0.2) {
            true => created_at + Duration::minutes(rng.gen_range(1..15)),
            false => created_at,
        };
        format!(
            "('{uuid}', '{post}', {parent}, '{author}', {}, {}, '{kind}', {}, '{}', '{}')",
            quote(name),
            quote(role),
            quote(&lipsum::lipsum_words(rng.gen_range(1..COMMENT_WORD_COUNT))),
            created_at.to_rfc3339(),
            updated_at.to_rfc3339(),
        )
    });
}
