#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use mfs_harness::{
    sample_image, validate_boot_sector_fixture, validate_dir_zone_fixture,
    validate_inode_fixture, validate_superblock_fixture, wrap_in_partition,
};
use std::env;
use std::fs;
use std::path::Path;

/// First sector of the partition in `--partitioned` sample images.
const SAMPLE_PARTITION_SECTOR: u32 = 63;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let cmd = args.first().map(String::as_str);

    match cmd {
        Some("generate") => generate(&args[1..]),
        Some("check-fixtures") => check_fixtures(),
        Some("--help" | "-h" | "help") | None => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            print_usage();
            bail!("unknown command: {other}")
        }
    }
}

fn generate(args: &[String]) -> Result<()> {
    let mut out = None;
    let mut partitioned = false;
    for arg in args {
        match arg.as_str() {
            "--partitioned" => partitioned = true,
            flag if flag.starts_with('-') => bail!("unknown generate option: {flag}"),
            path if out.is_none() => out = Some(Path::new(path)),
            extra => bail!("unexpected argument: {extra}"),
        }
    }
    let out = out.context("usage: mfs-harness generate <out.img> [--partitioned]")?;

    let mut image = sample_image()?;
    if partitioned {
        image = wrap_in_partition(&image, 0, SAMPLE_PARTITION_SECTOR)?;
    }
    fs::write(out, &image).with_context(|| format!("failed to write {}", out.display()))?;
    println!(
        "wrote {} ({} bytes{})",
        out.display(),
        image.len(),
        if partitioned { ", partition 0" } else { "" }
    );
    Ok(())
}

fn check_fixtures() -> Result<()> {
    let dir = Path::new("conformance/fixtures");
    let sb = validate_superblock_fixture(&dir.join("minix_superblock.json"))?;
    let inode = validate_inode_fixture(&dir.join("minix_inode_regular_file.json"))?;
    let entries = validate_dir_zone_fixture(&dir.join("minix_dir_zone.json"))?;
    let part = validate_boot_sector_fixture(&dir.join("boot_sector_partitioned.json"), 1)?;

    println!(
        "superblock: block_size={} inodes={} zones={}",
        sb.block_size, sb.inodes_count, sb.zones_count
    );
    println!("inode: {} size={}", inode.permission_string(), inode.size);
    println!("dir zone: {} live entries", entries.len());
    println!(
        "boot sector: entry 1 type={:#04x} first_sector={}",
        part.part_type, part.first_sector
    );
    Ok(())
}

fn print_usage() {
    println!("mfs-harness — MINIX fixture checks and sample image generation");
    println!();
    println!("USAGE:");
    println!("  mfs-harness generate <out.img> [--partitioned]");
    println!("  mfs-harness check-fixtures");
    println!();
    println!("GENERATE:");
    println!("  Writes a deterministic 1 KiB-zone image with nested directories,");
    println!("  a file using single-indirect zones, a sparse file with holes in");
    println!("  every addressing range, a hard link, and a deleted entry.");
    println!("  --partitioned places the filesystem in MINIX partition 0.");
    println!();
    println!("EXAMPLES:");
    println!("  mfs-harness generate sample.img");
    println!("  mfs ls sample.img /docs");
}
