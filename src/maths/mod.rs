pub mod fusedlibm;
