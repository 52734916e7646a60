#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use mfs_core::{Filesystem, Geometry, Listing, OpenOptions, Resolved, SubpartitionAddressing};
use mfs_error::MfsError;
use mfs_ondisk::{MinixInode, MinixSuperblock};
use serde::Serialize;
use std::env;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Serialize)]
struct SuperblockDump<'a> {
    superblock: &'a MinixSuperblock,
    geometry: &'a Geometry,
}

#[derive(Debug, Serialize)]
struct InodeDump<'a> {
    path: &'a str,
    inode_number: u32,
    permissions: String,
    inode: &'a MinixInode,
}

/// Arguments shared by `ls` and `get`.
#[derive(Debug)]
struct Invocation {
    options: OpenOptions,
    json: bool,
    image: PathBuf,
    rest: Vec<String>,
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        let code = error.downcast_ref::<MfsError>().map_or(1, MfsError::to_errno);
        std::process::exit(code);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "ls" => {
            let inv = parse_invocation(args, true)?;
            if inv.rest.len() > 1 {
                bail!("ls takes at most one path");
            }
            ls_cmd(&inv)
        }
        "get" => {
            let inv = parse_invocation(args, false)?;
            if inv.rest.is_empty() || inv.rest.len() > 2 {
                bail!("get requires <image> <srcpath> [dstpath]");
            }
            get_cmd(&inv)
        }
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        _ => {
            print_usage();
            bail!("unknown command: {command}")
        }
    }
}

fn print_usage() {
    println!("mfs — read files from MINIX v3 filesystem images\n");
    println!("USAGE:");
    println!("  mfs ls  [-v] [-p N [-s M]] [--relative-sub] [--json] <image> [path]");
    println!("  mfs get [-v] [-p N [-s M]] [--relative-sub] <image> <srcpath> [dstpath]");
    println!();
    println!("OPTIONS:");
    println!("  -p N             read the filesystem in primary partition N (0-3)");
    println!("  -s M             read subpartition M (0-3) of partition N");
    println!("  --relative-sub   subpartition start sectors count from the partition");
    println!("  -v               dump the superblock and target inode to stderr");
    println!("  --json           print listings and dumps as JSON");
}

fn parse_index(flag: &str, raw: Option<String>) -> Result<u8> {
    let raw = raw.with_context(|| format!("{flag} requires a value"))?;
    raw.parse()
        .with_context(|| format!("invalid {flag} value: {raw}"))
}

fn parse_invocation(args: impl Iterator<Item = String>, allow_json: bool) -> Result<Invocation> {
    let mut options = OpenOptions::default();
    let mut json = false;
    let mut positional = Vec::new();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-v" => options = options.verbose(true),
            "-p" => options = options.partition(parse_index("-p", args.next())?),
            "-s" => options = options.subpartition(parse_index("-s", args.next())?),
            "--relative-sub" => {
                options =
                    options.subpartition_addressing(SubpartitionAddressing::RelativeToPartition);
            }
            "--json" if allow_json => json = true,
            flag if flag.starts_with('-') && flag.len() > 1 => bail!("unknown option: {flag}"),
            _ => positional.push(arg),
        }
    }
    options.validate()?;

    let mut positional = positional.into_iter();
    let image = positional.next().context("missing <image> argument")?;
    Ok(Invocation {
        options,
        json,
        image: PathBuf::from(image),
        rest: positional.collect(),
    })
}

fn open_fs(inv: &Invocation) -> Result<Filesystem> {
    let fs = Filesystem::open(&inv.image, &inv.options)
        .with_context(|| format!("failed to open MINIX image {}", inv.image.display()))?;
    if inv.options.verbose {
        dump_superblock(&fs, inv.json)?;
    }
    Ok(fs)
}

fn dump_superblock(fs: &Filesystem, json: bool) -> Result<()> {
    let sb = fs.superblock();
    let geo = fs.geometry();
    if json {
        let dump = SuperblockDump {
            superblock: sb,
            geometry: geo,
        };
        eprintln!("{}", serde_json::to_string_pretty(&dump)?);
        return Ok(());
    }
    eprintln!("superblock at base offset {}:", geo.base_offset);
    eprintln!("  inodes           {}", sb.inodes_count);
    eprintln!("  zones            {}", sb.zones_count);
    eprintln!("  inode map blocks {}", sb.inode_bitmap_blocks);
    eprintln!("  zone map blocks  {}", sb.zone_bitmap_blocks);
    eprintln!("  first data zone  {}", sb.first_data_zone);
    eprintln!("  log zone size    {}", sb.log_zone_size);
    eprintln!("  max file         {}", sb.max_file);
    eprintln!("  magic            {:#06x}", sb.magic);
    eprintln!("  block size       {}", geo.block_size);
    eprintln!("  zone size        {}", geo.zone_size);
    eprintln!("  inode table      block {}", geo.inode_table_block);
    Ok(())
}

fn dump_inode(target: &Resolved, json: bool) -> Result<()> {
    let inode = &target.inode;
    if json {
        let dump = InodeDump {
            path: &target.path,
            inode_number: target.ino.0,
            permissions: inode.permission_string(),
            inode,
        };
        eprintln!("{}", serde_json::to_string_pretty(&dump)?);
        return Ok(());
    }
    eprintln!("inode {} ({}):", target.ino, target.path);
    eprintln!("  mode     {:#o} {}", inode.mode, inode.permission_string());
    eprintln!("  links    {}", inode.links_count);
    eprintln!("  uid/gid  {}/{}", inode.uid, inode.gid);
    eprintln!("  size     {}", inode.size);
    eprintln!("  times    a={} m={} c={}", inode.atime, inode.mtime, inode.ctime);
    let zones: Vec<String> = inode.zones.iter().map(ToString::to_string).collect();
    eprintln!("  zones    [{}]", zones.join(", "));
    eprintln!("  indirect {}", inode.indirect);
    eprintln!("  double   {}", inode.double_indirect);
    Ok(())
}

fn ls_cmd(inv: &Invocation) -> Result<()> {
    let fs = open_fs(inv)?;
    let path = inv.rest.first().map_or("/", String::as_str);
    if inv.options.verbose {
        let target = fs
            .resolve(path)
            .with_context(|| format!("cannot resolve {path}"))?;
        dump_inode(&target, inv.json)?;
    }
    let listing = fs
        .list(path)
        .with_context(|| format!("cannot list {path}"))?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if inv.json {
        serde_json::to_writer_pretty(&mut out, &listing)?;
        writeln!(out)?;
    } else {
        match &listing {
            Listing::Directory { path, entries } => {
                writeln!(out, "{path}:")?;
                for entry in entries {
                    writeln!(
                        out,
                        "{} {:>9} {}",
                        entry.permission_string(),
                        entry.size,
                        entry.name
                    )?;
                }
            }
            Listing::File { name, inode, .. } => {
                writeln!(
                    out,
                    "{} {:>9} {name}",
                    inode.permission_string(),
                    inode.size
                )?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn get_cmd(inv: &Invocation) -> Result<()> {
    let fs = open_fs(inv)?;
    let src = inv.rest[0].as_str();
    let file = fs
        .resolve(src)
        .with_context(|| format!("cannot resolve {src}"))?;
    if inv.options.verbose {
        dump_inode(&file, inv.json)?;
    }
    if !file.inode.is_regular() {
        return Err(MfsError::NotRegularFile { inode: file.ino.0 })
            .with_context(|| format!("cannot extract {src}"));
    }

    let written = match inv.rest.get(1) {
        Some(dst) => write_output(Path::new(dst), |out| {
            fs.extract(&file, out)
                .with_context(|| format!("failed to extract {src}"))
        })?,
        None => {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            let n = fs
                .extract(&file, &mut out)
                .with_context(|| format!("failed to extract {src}"))?;
            out.flush()?;
            n
        }
    };
    if inv.options.verbose {
        eprintln!("extracted {written} bytes from {}", file.path);
    }
    Ok(())
}

/// Stream into a temporary file beside `dst` and move it into place once
/// `fill` succeeds. On failure `dst` is left as it was.
fn write_output(dst: &Path, fill: impl FnOnce(&mut dyn Write) -> Result<u64>) -> Result<u64> {
    let dir = match dst.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create a temporary file in {}", dir.display()))?;
    let written = {
        let mut out = BufWriter::new(tmp.as_file_mut());
        let n = fill(&mut out)?;
        out.flush()?;
        n
    };
    tmp.persist(dst)
        .with_context(|| format!("failed to write {}", dst.display()))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn entries(dir: &Path) -> Vec<PathBuf> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .expect("read_dir")
            .map(|entry| entry.expect("entry").path())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn output_lands_only_after_success() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dst = dir.path().join("hello.txt");

        let n = write_output(&dst, |out| {
            out.write_all(b"hello\n")?;
            Ok(6)
        })
        .expect("write");
        assert_eq!(n, 6);
        assert_eq!(fs::read(&dst).expect("read"), b"hello\n");
        assert_eq!(entries(dir.path()), vec![dst]);
    }

    #[test]
    fn failed_extraction_leaves_no_partial_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dst = dir.path().join("big.bin");

        let err = write_output(&dst, |out| {
            out.write_all(&[0xAB; 4096])?;
            Err(MfsError::Io(io::Error::from(io::ErrorKind::UnexpectedEof)).into())
        })
        .expect_err("fill fails");
        assert!(err.downcast_ref::<MfsError>().is_some());
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn failed_extraction_keeps_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dst = dir.path().join("keep.txt");
        fs::write(&dst, b"original").expect("seed");

        write_output(&dst, |_| bail!("extraction failed")).expect_err("fill fails");
        assert_eq!(fs::read(&dst).expect("read"), b"original");
        assert_eq!(entries(dir.path()), vec![dst]);
    }
}
