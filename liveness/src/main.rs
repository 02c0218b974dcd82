fn main() {
  support::cli_main(liveness::liveness);
}
