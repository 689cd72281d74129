/*!
 * Command dispatcher
 *
 * Maps a parsed request array to a `Reply`, invoking the store. `dispatch`
 * owns command-name matching, arity checks, and option parsing itself,
 * keeping the codec command-agnostic.
 *
 * Each handler is a pure function of request + store + current time;
 * there is no per-client or per-command state beyond the store.
 */

use crate::protocol::{upper_ascii, Reply};
use crate::storage::{now_ms, parse_strict_i64, Store, Value};
use std::collections::VecDeque;

const ERR_WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";
const ERR_BAD_INT: &str = "value is not an integer or out of range";
const ERR_BAD_TTL: &str = "invalid expire time in 'set' command";
const ERR_SYNTAX: &str = "syntax error";

fn err(s: impl Into<String>) -> Reply {
    Reply::SimpleError(s.into())
}

fn wrong_arity(cmd_name: &str) -> Reply {
    err(format!("wrong number of arguments for '{cmd_name}' command"))
}

/// Dispatch one parsed request against `store`, returning the reply to send.
///
/// `args` is the full request array including the command name at index 0.
/// An empty `args` never reaches here (the codec rejects an empty array).
pub fn dispatch(store: &Store, args: &[Vec<u8>]) -> Reply {
    let name = upper_ascii(&args[0]);
    match name.as_str() {
        "PING" => ping(args),
        "ECHO" => echo(args),
        "SET" => set(store, args),
        "GET" => get(store, args),
        "EXISTS" => exists(store, args),
        "DEL" => del(store, args),
        "INCR" => incr_decr(store, args, 1, "INCR"),
        "DECR" => incr_decr(store, args, -1, "DECR"),
        "LPUSH" => push(store, args, true),
        "RPUSH" => push(store, args, false),
        "LRANGE" => lrange(store, args),
        _ => err(format!(
            "unknown command '{}'",
            String::from_utf8_lossy(&args[0])
        )),
    }
}

fn ping(args: &[Vec<u8>]) -> Reply {
    match args.len() {
        1 => Reply::bulk(b"PONG".to_vec()),
        2 => Reply::bulk(args[1].clone()),
        _ => wrong_arity("ping"),
    }
}

fn echo(args: &[Vec<u8>]) -> Reply {
    match args.len() {
        2 => Reply::bulk(args[1].clone()),
        _ => wrong_arity("echo"),
    }
}

/// Parse a raw command argument as a signed 64-bit decimal. Unlike
/// `parse_strict_i64` (which re-interprets a stored `StringVal` under the
/// data model's strict grammar), command arguments like LRANGE's bounds or
/// SET's EX/PX/EXAT/PXAT operand accept any integer token `i64::parse`
/// would, including leading zeros.
fn parse_i64_arg(b: &[u8]) -> Option<i64> {
    std::str::from_utf8(b).ok()?.parse::<i64>().ok()
}

/// Absolute expiration instant (ms since epoch) for a SET option+operand,
/// or an error reply if the operand or option is malformed.
fn set_expiry(option: &[u8], operand: &[u8]) -> Result<u64, Reply> {
    let n = parse_i64_arg(operand).ok_or_else(|| err(ERR_BAD_INT))?;

    let upper = upper_ascii(option);
    match upper.as_str() {
        "EX" => {
            if n <= 0 {
                return Err(err(ERR_BAD_TTL));
            }
            Ok(now_ms() + (n as u64) * 1000)
        }
        "PX" => {
            if n <= 0 {
                return Err(err(ERR_BAD_TTL));
            }
            Ok(now_ms() + n as u64)
        }
        "EXAT" => {
            if n <= 0 {
                return Err(err(ERR_BAD_TTL));
            }
            let now_s = (now_ms() / 1000) as i64;
            if n - now_s <= 0 {
                return Err(err(ERR_BAD_TTL));
            }
            Ok((n as u64) * 1000)
        }
        "PXAT" => {
            if n <= 0 {
                return Err(err(ERR_BAD_TTL));
            }
            if n - (now_ms() as i64) <= 0 {
                return Err(err(ERR_BAD_TTL));
            }
            Ok(n as u64)
        }
        _ => Err(err(ERR_SYNTAX)),
    }
}

fn set(store: &Store, args: &[Vec<u8>]) -> Reply {
    match args.len() {
        3 => {
            store.store(args[1].clone(), Value::Str(args[2].clone()), None);
            Reply::SimpleString("OK".into())
        }
        5 => {
            // Validate (and fail) before any mutation: a rejected TTL must
            // never leave the key's prior state changed.
            match set_expiry(&args[3], &args[4]) {
                Ok(expires_at) => {
                    store.store(args[1].clone(), Value::Str(args[2].clone()), Some(expires_at));
                    Reply::SimpleString("OK".into())
                }
                Err(reply) => reply,
            }
        }
        _ => wrong_arity("set"),
    }
}

fn get(store: &Store, args: &[Vec<u8>]) -> Reply {
    if args.len() != 2 {
        return wrong_arity("get");
    }
    match store.load(&args[1]) {
        Some(Value::Str(b)) => Reply::bulk(b),
        Some(Value::List(_)) => err(ERR_WRONGTYPE),
        None => Reply::Null,
    }
}

fn exists(store: &Store, args: &[Vec<u8>]) -> Reply {
    if args.len() < 2 {
        return wrong_arity("EXISTS");
    }
    let count = args[1..].iter().filter(|k| store.exists(k)).count();
    Reply::Integer(count as i64)
}

fn del(store: &Store, args: &[Vec<u8>]) -> Reply {
    if args.len() < 2 {
        return wrong_arity("DEL");
    }
    let count = args[1..].iter().filter(|k| store.delete(k)).count();
    Reply::Integer(count as i64)
}

fn incr_decr(store: &Store, args: &[Vec<u8>], delta: i64, cmd_name: &str) -> Reply {
    if args.len() != 2 {
        return wrong_arity(cmd_name);
    }
    store.compute(&args[1], |cur| match cur {
        None => {
            let n = delta;
            (Some(Value::Str(n.to_string().into_bytes())), Reply::Integer(n))
        }
        Some(v @ Value::List(_)) => (Some(v), err(ERR_WRONGTYPE)),
        Some(Value::Str(b)) => match parse_strict_i64(&b) {
            Some(n) => {
                let next = n + delta;
                (
                    Some(Value::Str(next.to_string().into_bytes())),
                    Reply::Integer(next),
                )
            }
            None => (Some(Value::Str(b)), err(ERR_BAD_INT)),
        },
    })
}

fn push(store: &Store, args: &[Vec<u8>], left: bool) -> Reply {
    let cmd_name = if left { "LPUSH" } else { "RPUSH" };
    if args.len() < 3 {
        return wrong_arity(cmd_name);
    }
    let elems = &args[2..];
    store.compute(&args[1], |cur| {
        let mut list = match cur {
            None => VecDeque::new(),
            Some(Value::List(l)) => l,
            Some(v @ Value::Str(_)) => return (Some(v), err(ERR_WRONGTYPE)),
        };
        if left {
            // Equivalent to prepending each element to the head in argument
            // order: the last argument ends up first in the list.
            for e in elems {
                list.push_front(e.clone());
            }
        } else {
            for e in elems {
                list.push_back(e.clone());
            }
        }
        let len = list.len() as i64;
        (Some(Value::List(list)), Reply::Integer(len))
    })
}

fn lrange(store: &Store, args: &[Vec<u8>]) -> Reply {
    if args.len() != 4 {
        return wrong_arity("LRANGE");
    }
    let start = match parse_i64_arg(&args[2]) {
        Some(n) => n,
        None => return err(ERR_BAD_INT),
    };
    let stop = match parse_i64_arg(&args[3]) {
        Some(n) => n,
        None => return err(ERR_BAD_INT),
    };

    let list = match store.load(&args[1]) {
        None => return Reply::Array(vec![]),
        Some(Value::Str(_)) => return err(ERR_WRONGTYPE),
        Some(Value::List(l)) => l,
    };

    let l = list.len() as i64;
    if start >= l {
        return Reply::Array(vec![]);
    }
    if start == 0 && stop == -1 {
        return Reply::bulk_array(list.into_iter().collect());
    }

    let s = if start < 0 { (l + start).max(0) } else { start };
    let e = if stop < 0 {
        let e = l + stop + 1;
        if e < 0 {
            l
        } else {
            e
        }
    } else if stop > l {
        l
    } else {
        stop + 1
    };

    if s > e {
        return Reply::Array(vec![]);
    }
    let slice: Vec<Vec<u8>> = list
        .into_iter()
        .skip(s as usize)
        .take((e - s) as usize)
        .collect();
    Reply::bulk_array(slice)
}
